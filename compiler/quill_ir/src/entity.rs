//! Compile-time-known entities.
//!
//! An [`EntityRef`] names a callable or storage location the compiler can
//! address directly: a function in some module, a host command, a local or
//! global variable, or a macro command. Entity references are immutable
//! values compared structurally.

use std::fmt;
use std::sync::Arc;

/// Name of a compilation module.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ModuleName(Arc<str>);

impl ModuleName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        ModuleName(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleName({})", self.0)
    }
}

/// A variable, either local to the compiling function or global to a module.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum VariableRef {
    Local { id: String },
    Global { id: String, module: ModuleName },
}

impl VariableRef {
    pub fn id(&self) -> &str {
        match self {
            VariableRef::Local { id } | VariableRef::Global { id, .. } => id,
        }
    }
}

/// A compile-time-known callable or storage location.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum EntityRef {
    /// A function defined in a module.
    Function { id: String, module: ModuleName },
    /// A host-provided command.
    Command { id: String },
    /// A local or global variable.
    Variable(VariableRef),
    /// A command that runs at compile time and rewrites its call site.
    MacroCommand { id: String },
}

impl EntityRef {
    pub fn function(id: impl Into<String>, module: ModuleName) -> Self {
        EntityRef::Function {
            id: id.into(),
            module,
        }
    }

    pub fn command(id: impl Into<String>) -> Self {
        EntityRef::Command { id: id.into() }
    }

    pub fn local(id: impl Into<String>) -> Self {
        EntityRef::Variable(VariableRef::Local { id: id.into() })
    }

    pub fn global(id: impl Into<String>, module: ModuleName) -> Self {
        EntityRef::Variable(VariableRef::Global {
            id: id.into(),
            module,
        })
    }

    pub fn macro_command(id: impl Into<String>) -> Self {
        EntityRef::MacroCommand { id: id.into() }
    }

    /// The entity's identifier, without module qualification.
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Function { id, .. }
            | EntityRef::Command { id }
            | EntityRef::MacroCommand { id } => id,
            EntityRef::Variable(var) => var.id(),
        }
    }

    /// Check if this entity is a local variable.
    pub fn is_local_variable(&self) -> bool {
        matches!(self, EntityRef::Variable(VariableRef::Local { .. }))
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Function { id, module } => write!(f, "function {id}/{module}"),
            EntityRef::Command { id } => write!(f, "command {id}"),
            EntityRef::Variable(VariableRef::Local { id }) => write!(f, "local {id}"),
            EntityRef::Variable(VariableRef::Global { id, module }) => {
                write!(f, "global {id}/{module}")
            }
            EntityRef::MacroCommand { id } => write!(f, "macro command {id}"),
        }
    }
}
