use std::fmt;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use hashbrown::HashMap;

use crate::error::LoadError;
use crate::value::Value;

/// Export name used when a request does not name one.
pub const DEFAULT_IMPORT_NAME: &str = "default";

/// A loaded hook body: ordered arguments in, one opaque value out.
///
/// The body is called on every render of its execution unit and may itself
/// use positional state (`useState`, `remember`, effects), so it must call
/// those unconditionally and in the same order each time.
#[derive(Clone)]
pub struct RemoteHook {
    body: Rc<dyn Fn(&[Value]) -> Value>,
    label: Option<Rc<str>>,
}

impl RemoteHook {
    pub fn new(body: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self {
            body: Rc::new(body),
            label: None,
        }
    }

    pub fn labeled(label: impl Into<Rc<str>>, body: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self {
            body: Rc::new(body),
            label: Some(label.into()),
        }
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }

    /// Identity of the underlying callable. Clones share it; two hooks built
    /// from separate closures never do.
    pub fn key(&self) -> usize {
        Rc::as_ptr(&self.body) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &RemoteHook) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Debug for RemoteHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHook")
            .field("label", &self.label)
            .field("key", &format_args!("{:#x}", self.key()))
            .finish()
    }
}

/// What to load: a module exposed by a remote scope, and the export to take.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRequest {
    pub scope: String,
    pub module: String,
    pub import_name: String,
}

impl ModuleRequest {
    pub fn new(scope: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            module: module.into(),
            import_name: DEFAULT_IMPORT_NAME.to_string(),
        }
    }

    pub fn with_import(mut self, import_name: impl Into<String>) -> Self {
        self.import_name = import_name.into();
        self
    }
}

impl fmt::Display for ModuleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.scope, self.module, self.import_name)
    }
}

pub type ResolveFuture = LocalBoxFuture<'static, Result<RemoteHook, LoadError>>;

/// Asynchronous lookup of remote hooks.
///
/// Failures are reported as-is; callers never retry.
pub trait HookResolver {
    fn resolve(&self, request: &ModuleRequest) -> ResolveFuture;
}

impl<F> HookResolver for F
where
    F: Fn(&ModuleRequest) -> ResolveFuture,
{
    fn resolve(&self, request: &ModuleRequest) -> ResolveFuture {
        self(request)
    }
}

/// In-memory module registry that resolves immediately.
#[derive(Default, Clone)]
pub struct StaticResolver {
    scopes: HashMap<String, HashMap<String, HashMap<String, RemoteHook>>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` as `import_name` of `scope/module`, replacing any
    /// previous export of that name.
    pub fn insert(
        &mut self,
        scope: impl Into<String>,
        module: impl Into<String>,
        import_name: impl Into<String>,
        hook: RemoteHook,
    ) {
        self.scopes
            .entry(scope.into())
            .or_default()
            .entry(module.into())
            .or_default()
            .insert(import_name.into(), hook);
    }

    pub fn with_hook(
        mut self,
        scope: impl Into<String>,
        module: impl Into<String>,
        import_name: impl Into<String>,
        hook: RemoteHook,
    ) -> Self {
        self.insert(scope, module, import_name, hook);
        self
    }

    /// Shorthand for registering the default export.
    pub fn with_default(
        self,
        scope: impl Into<String>,
        module: impl Into<String>,
        hook: RemoteHook,
    ) -> Self {
        self.with_hook(scope, module, DEFAULT_IMPORT_NAME, hook)
    }

    pub fn lookup(&self, request: &ModuleRequest) -> Result<RemoteHook, LoadError> {
        let modules = self
            .scopes
            .get(&request.scope)
            .ok_or_else(|| LoadError::ScopeNotFound {
                scope: request.scope.clone(),
            })?;
        let exports = modules
            .get(&request.module)
            .ok_or_else(|| LoadError::ModuleNotFound {
                scope: request.scope.clone(),
                module: request.module.clone(),
            })?;
        exports
            .get(&request.import_name)
            .cloned()
            .ok_or_else(|| LoadError::ImportNotFound {
                scope: request.scope.clone(),
                module: request.module.clone(),
                import_name: request.import_name.clone(),
            })
    }
}

impl HookResolver for StaticResolver {
    fn resolve(&self, request: &ModuleRequest) -> ResolveFuture {
        future::ready(self.lookup(request)).boxed_local()
    }
}
