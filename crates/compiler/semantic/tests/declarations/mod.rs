mod captures;
mod containers;
mod functions;
mod scopes;
