//! Per-function compilation state.
//!
//! A [`CompileContext`] is threaded through optimization and emission. It
//! owns everything that lives exactly as long as one compilation unit:
//! label numbering, the scope stack for block declarations, the loop and
//! protected-region stacks, and recorded acceleration hints.

use std::rc::Rc;

use quill_diagnostic::{symbol_not_found, Diagnostic, DiagnosticSink};
use quill_ir::{EntityRef, ModuleName, Position};
use quill_symbols::{Symbol, SymbolStore};
use smallvec::SmallVec;

use crate::target::LabelGenerator;
use crate::{ArgumentsProxy, CompilerOptions, DynamicValueModel, Emitter, InternalError, MacroHost, ValueModel};

/// The function being compiled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionInfo {
    pub id: String,
    pub module: ModuleName,
    pub parameters: Vec<String>,
    /// The body reads its argument list directly, so parameters cannot
    /// be overwritten for a self tail call.
    pub uses_arguments: bool,
}

impl FunctionInfo {
    pub fn new(id: impl Into<String>, module: ModuleName) -> Self {
        FunctionInfo {
            id: id.into(),
            module,
            parameters: Vec::new(),
            uses_arguments: false,
        }
    }

    #[must_use]
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// Check if `entity` is this function.
    pub fn is_self(&self, entity: &EntityRef) -> bool {
        matches!(entity, EntityRef::Function { id, module } if *id == self.id && *module == self.module)
    }
}

/// Addresses of the calls a foreach loop makes on its enumerator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ForeachHint {
    /// Local variable holding the enumerator.
    pub enumerator: String,
    pub get_enumerator: usize,
    pub move_next: usize,
    pub current: usize,
    pub dispose: usize,
}

/// Jump targets of the innermost loops.
#[derive(Clone, Debug)]
pub(crate) struct LoopLabels {
    pub continue_label: String,
    pub break_label: String,
    /// Protected regions already open when the loop started.
    pub protected_depth: usize,
}

/// Kinds of region control transfer must leave rather than jump out of.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ProtectedKind {
    Try,
    Catch,
    Finally,
    Using,
    Foreach,
}

pub struct CompileContext<'a> {
    pub target: &'a mut dyn Emitter,
    pub diagnostics: &'a mut dyn DiagnosticSink,
    pub values: &'a dyn ValueModel,
    pub options: CompilerOptions,
    pub function: FunctionInfo,
    macros: Option<&'a mut dyn MacroHost>,
    labels: LabelGenerator,
    root: Rc<SymbolStore>,
    scopes: Vec<SymbolStore>,
    loops: SmallVec<[LoopLabels; 4]>,
    protected: SmallVec<[ProtectedKind; 4]>,
    active_expansions: Vec<*const ()>,
    temporaries: Vec<String>,
    hints: Vec<ForeachHint>,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        target: &'a mut dyn Emitter,
        diagnostics: &'a mut dyn DiagnosticSink,
        function: FunctionInfo,
        root: Rc<SymbolStore>,
    ) -> Self {
        CompileContext {
            target,
            diagnostics,
            values: &DynamicValueModel,
            options: CompilerOptions::default(),
            function,
            macros: None,
            labels: LabelGenerator::new(),
            root,
            scopes: Vec::new(),
            loops: SmallVec::new(),
            protected: SmallVec::new(),
            active_expansions: Vec::new(),
            temporaries: Vec::new(),
            hints: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_macros(mut self, macros: &'a mut dyn MacroHost) -> Self {
        self.macros = Some(macros);
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: &'a dyn ValueModel) -> Self {
        self.values = values;
        self
    }

    /// Local variables introduced by the compiler for this function.
    pub fn temporaries(&self) -> &[String] {
        &self.temporaries
    }

    /// Acceleration hints recorded so far.
    pub fn hints(&self) -> &[ForeachHint] {
        &self.hints
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }

    pub fn fresh_label(&mut self, prefix: &str) -> String {
        self.labels.fresh(prefix)
    }

    /// A new local variable name no source program can spell.
    pub fn allocate_temporary(&mut self, prefix: &str) -> String {
        let name = self.labels.fresh(prefix);
        self.temporaries.push(name.clone());
        name
    }

    /// Resolve `name` through block scopes, innermost first, then the
    /// function's root scope.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.try_get(name))
            .or_else(|| self.root.try_get(name))
    }

    /// Resolve `name`, or produce a symbol carrying the not-found error.
    pub fn resolve_or_report(&self, name: &str, position: &Position) -> Symbol {
        self.resolve(name).unwrap_or_else(|| {
            Symbol::message(
                symbol_not_found(position.clone(), name),
                Symbol::nil(position.clone()),
            )
        })
    }

    pub(crate) fn push_scope(&mut self, declarations: &[(String, Symbol)]) {
        let mut scope = SymbolStore::new();
        for (name, symbol) in declarations {
            scope.declare(name.clone(), symbol.clone());
        }
        self.scopes.push(scope);
    }

    pub(crate) fn pop_scope(&mut self) -> Result<(), InternalError> {
        self.scopes
            .pop()
            .map(drop)
            .ok_or_else(|| InternalError::UnbalancedScope("scope popped more often than pushed".to_owned()))
    }

    pub(crate) fn push_loop(&mut self, continue_label: String, break_label: String) {
        let protected_depth = self.protected.len();
        self.loops.push(LoopLabels {
            continue_label,
            break_label,
            protected_depth,
        });
    }

    pub(crate) fn pop_loop(&mut self) -> Result<(), InternalError> {
        self.loops
            .pop()
            .map(drop)
            .ok_or_else(|| InternalError::UnbalancedScope("loop popped more often than pushed".to_owned()))
    }

    pub(crate) fn innermost_loop(&self) -> Option<&LoopLabels> {
        self.loops.last()
    }

    pub(crate) fn enter_protected(&mut self, kind: ProtectedKind) {
        self.protected.push(kind);
    }

    pub(crate) fn leave_protected(&mut self) -> Result<(), InternalError> {
        self.protected.pop().map(drop).ok_or_else(|| {
            InternalError::UnbalancedScope("protected region closed more often than opened".to_owned())
        })
    }

    pub(crate) fn protected_depth(&self) -> usize {
        self.protected.len()
    }

    /// Mark the invocation node owning `node` as being expanded.
    ///
    /// Identity is the node itself, so an expansion may contain a fresh
    /// invocation of the same macro at the same position.
    pub(crate) fn begin_expansion(
        &mut self,
        node: &ArgumentsProxy,
        macro_ref: &EntityRef,
        position: &Position,
    ) -> Result<(), InternalError> {
        let key = std::ptr::from_ref(node).cast::<()>();
        if self.active_expansions.contains(&key) {
            return Err(InternalError::ReentrantMacroExpansion {
                macro_id: macro_ref.id().to_owned(),
                position: position.clone(),
            });
        }
        self.active_expansions.push(key);
        Ok(())
    }

    pub(crate) fn end_expansion(&mut self) {
        self.active_expansions.pop();
    }

    pub(crate) fn macro_host(&mut self) -> Option<&mut (dyn MacroHost + 'a)> {
        self.macros.as_deref_mut()
    }

    pub(crate) fn record_hint(&mut self, hint: ForeachHint) {
        tracing::trace!(enumerator = %hint.enumerator, "recorded foreach hint");
        self.hints.push(hint);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests {
    use super::*;
    use crate::CodeBuffer;

    #[test]
    fn block_scopes_shadow_the_root() {
        let mut root = SymbolStore::new();
        let pos = Position::synthetic();
        root.declare("x", Symbol::call(EntityRef::local("outer"), pos.clone()));
        let mut code = CodeBuffer::new();
        let mut diags: Vec<Diagnostic> = Vec::new();
        let function = FunctionInfo::new("main", ModuleName::new("m"));
        let mut cx = CompileContext::new(&mut code, &mut diags, function, Rc::new(root));

        cx.push_scope(&[("x".to_owned(), Symbol::call(EntityRef::local("inner"), pos.clone()))]);
        assert_eq!(
            cx.resolve("x").and_then(|s| s.entity().cloned()),
            Some(EntityRef::local("inner"))
        );
        cx.pop_scope().unwrap();
        assert_eq!(
            cx.resolve("x").and_then(|s| s.entity().cloned()),
            Some(EntityRef::local("outer"))
        );
        assert!(cx.resolve_or_report("y", &pos).has_error());
        assert!(cx.pop_scope().is_err());
    }

    #[test]
    fn only_the_same_invocation_is_reentrant() {
        let mut code = CodeBuffer::new();
        let mut diags: Vec<Diagnostic> = Vec::new();
        let function = FunctionInfo::new("main", ModuleName::new("m"));
        let mut cx = CompileContext::new(&mut code, &mut diags, function, Rc::default());
        let m = EntityRef::macro_command("m");
        let pos = Position::new("a", 1, 1);
        let outer = ArgumentsProxy::default();
        let inner = ArgumentsProxy::default();

        cx.begin_expansion(&outer, &m, &pos).unwrap();
        assert!(matches!(
            cx.begin_expansion(&outer, &m, &pos),
            Err(InternalError::ReentrantMacroExpansion { .. })
        ));
        cx.begin_expansion(&inner, &m, &pos).unwrap();
        cx.end_expansion();
        cx.end_expansion();
        cx.begin_expansion(&outer, &m, &pos).unwrap();
    }

    #[test]
    fn temporaries_are_unique() {
        let mut code = CodeBuffer::new();
        let mut diags: Vec<Diagnostic> = Vec::new();
        let function = FunctionInfo::new("main", ModuleName::new("m"));
        let mut cx = CompileContext::new(&mut code, &mut diags, function, Rc::default());
        let a = cx.allocate_temporary("tmp");
        let b = cx.allocate_temporary("tmp");
        assert_ne!(a, b);
        assert_eq!(cx.temporaries(), &[a, b]);
    }
}
