use bitflags::bitflags;
use ziglens_compiler_diagnostics::Range;
use ziglens_compiler_parser::NodeIndex;

use super::ContextId;
use crate::identifier::Identifier;
use crate::types::Type;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// Variables, constants, fields, parameters and captures
    Instance,
    /// Containers, enums, unions, error sets and the module itself
    Type,
    Function,
    /// A name bound to an `@import`
    Alias,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassType {
    Struct,
    Enum,
    Union,
    Opaque,
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeclFlags: u16 {
        const DEFINITION = 1 << 0;
        /// Field of a struct, enum, union or error set
        const CLASS_MEMBER = 1 << 1;
        const PARAM = 1 << 2;
        /// Bound by `|x|` payload syntax
        const CAPTURE = 1 << 3;
        /// The declaration standing for a whole file
        const MODULE = 1 << 4;
        const PUBLIC = 1 << 5;
        const COMPTIME = 1 << 6;
        const TEST = 1 << 7;
        /// Synthetic name of a container that is not bound to a variable
        const ANONYMOUS = 1 << 8;
    }
}

/// A named entity introduced by the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub identifier: Identifier,
    /// Range of the name token
    pub range: Range,
    /// Scope the declaration lives in
    pub context: ContextId,
    pub kind: DeclarationKind,
    pub class_type: Option<ClassType>,
    pub flags: DeclFlags,
    pub comment: Option<String>,
    pub ty: Type,
    /// Body scope of a type, function or module
    pub internal_context: Option<ContextId>,
    /// Syntax node that introduced the declaration
    pub node: NodeIndex,
    /// For functions returning a parameter unchanged, that parameter's position.
    pub returned_param: Option<u32>,
    /// Integer tag of an enum member, explicit or continuing from its predecessor.
    pub tag_value: Option<i128>,
}

impl Declaration {
    pub fn new(identifier: Identifier, range: Range, context: ContextId, node: NodeIndex) -> Self {
        Self {
            identifier,
            range,
            context,
            kind: DeclarationKind::Instance,
            class_type: None,
            flags: DeclFlags::DEFINITION,
            comment: None,
            ty: Type::unknown(),
            internal_context: None,
            node,
            returned_param: None,
            tag_value: None,
        }
    }

    pub fn is_type_declaration(&self) -> bool {
        self.kind == DeclarationKind::Type
    }

    pub fn is_function(&self) -> bool {
        self.kind == DeclarationKind::Function
    }

    pub fn is_module(&self) -> bool {
        self.flags.contains(DeclFlags::MODULE)
    }

    /// Declarations that source code can refer to by name.
    pub fn is_nameable(&self) -> bool {
        !self.identifier.is_empty()
            && !self
                .flags
                .intersects(DeclFlags::MODULE | DeclFlags::TEST | DeclFlags::ANONYMOUS)
    }

    /// One-line summary used by completion and the tree dump.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.identifier, self.ty)
    }
}
