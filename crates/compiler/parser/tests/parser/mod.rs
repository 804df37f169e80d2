mod expressions;
mod statements;
mod toplevel;
