// Context manager: the privileged default context. Creates, tracks and
// destroys execution contexts and routes per-context requests to them.

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use weft_ffi::{
    ContextId, DEFAULT_CONTEXT_ID, InstanceId, ScriptComponentProxy, ScriptObjectInstanceInfo,
    UObjectPtr,
};

use crate::assembly::{AssemblyCatalog, ENGINE_ASSEMBLY};
use crate::config::HostConfig;
use crate::context::{ExecutionContext, RemovedInstance};
use crate::error::{WeftError, WeftResult};
use crate::logging::{LogLevel, Logger};
use crate::native::FunctionTables;
use crate::wlog;

pub struct ContextManager {
    config: HostConfig,
    log: Logger,
    catalog: Arc<AssemblyCatalog>,
    contexts: BTreeMap<ContextId, ExecutionContext>,
    next_id: ContextId,
}

impl ContextManager {
    pub fn new(config: HostConfig, log: Logger, catalog: AssemblyCatalog) -> Self {
        ContextManager {
            config,
            log,
            catalog: Arc::new(catalog),
            contexts: BTreeMap::new(),
            next_id: DEFAULT_CONTEXT_ID + 1,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.log
    }

    pub fn catalog(&self) -> &AssemblyCatalog {
        &self.catalog
    }

    pub fn context_ids(&self) -> Vec<ContextId> {
        self.contexts.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    fn require_privileged(requester: ContextId) -> WeftResult<()> {
        if requester != DEFAULT_CONTEXT_ID {
            return Err(WeftError::NotPrivileged(requester));
        }
        Ok(())
    }

    /// Why `id` is not registered: issued ids are gone, anything else was
    /// never handed out.
    fn missing(&self, id: ContextId) -> WeftError {
        if id > DEFAULT_CONTEXT_ID && id < self.next_id {
            WeftError::AlreadyUnloaded(id)
        } else {
            WeftError::ContextNotFound(id)
        }
    }

    pub fn context(&self, id: ContextId) -> WeftResult<&ExecutionContext> {
        if id == DEFAULT_CONTEXT_ID {
            return Err(WeftError::DefaultContextImmutable);
        }
        self.contexts.get(&id).ok_or_else(|| self.missing(id))
    }

    pub fn context_mut(&mut self, id: ContextId) -> WeftResult<&mut ExecutionContext> {
        if id == DEFAULT_CONTEXT_ID {
            return Err(WeftError::DefaultContextImmutable);
        }
        let missing = self.missing(id);
        self.contexts.get_mut(&id).ok_or(missing)
    }

    // -----------------------------------------------------------------------
    // Context lifecycle
    // -----------------------------------------------------------------------

    /// Create an isolated context rooted at `application_base`, or at the
    /// configured base when none is given.
    pub fn create_context(&mut self, requester: ContextId, application_base: Option<&Path>) -> WeftResult<ContextId> {
        ContextManager::require_privileged(requester)?;
        let base: PathBuf = application_base.map_or_else(|| self.config.application_base.clone(), Path::to_path_buf);
        if !base.is_dir() {
            return Err(WeftError::InvalidApplicationBase(base.display().to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        let ctx = ExecutionContext::new(id, base, self.catalog.clone(), self.log.clone());
        self.contexts.insert(id, ctx);
        wlog!(self.log, LogLevel::Verbose, "[Weft] created context {id}");
        Ok(id)
    }

    /// Unregister one context without unloading it. The caller unloads it,
    /// or drops it, which unloads too.
    pub fn remove_context(&mut self, requester: ContextId, id: ContextId) -> WeftResult<ExecutionContext> {
        ContextManager::require_privileged(requester)?;
        if id == DEFAULT_CONTEXT_ID {
            return Err(WeftError::DefaultContextImmutable);
        }
        let missing = self.missing(id);
        self.contexts.remove(&id).ok_or(missing)
    }

    /// Unregister then unload one context. The id is gone even if unloading fails.
    pub fn destroy_context(&mut self, requester: ContextId, id: ContextId) -> WeftResult<()> {
        self.remove_context(requester, id)?.unload()
    }

    /// Unregister every context, in id order, without unloading.
    pub fn remove_all_contexts(&mut self, requester: ContextId) -> WeftResult<Vec<ExecutionContext>> {
        ContextManager::require_privileged(requester)?;
        Ok(std::mem::take(&mut self.contexts).into_values().collect())
    }

    /// Unload every context in id order. Failures are logged once each and
    /// returned; the sweep never stops early and the registry ends up empty.
    pub fn destroy_all_contexts(&mut self, requester: ContextId) -> WeftResult<Vec<(ContextId, WeftError)>> {
        let contexts = self.remove_all_contexts(requester)?;
        Ok(ContextManager::unload_all(&self.log, contexts))
    }

    /// Unload removed contexts, logging each failure once.
    pub fn unload_all(log: &Logger, contexts: Vec<ExecutionContext>) -> Vec<(ContextId, WeftError)> {
        let mut failures = Vec::new();
        for mut ctx in contexts {
            let id = ctx.id();
            if let Err(err) = ctx.unload() {
                wlog!(log, LogLevel::Error, "[Weft] failed to unload context {id}: {err}");
                failures.push((id, err));
            }
        }
        failures
    }

    // -----------------------------------------------------------------------
    // Per-context routing
    // -----------------------------------------------------------------------

    /// Bind tables into a context, then load the configured assemblies.
    /// Preload failures are logged and do not fail the bind.
    pub fn bind_function_tables(&mut self, id: ContextId, tables: FunctionTables) -> WeftResult<()> {
        let mut preload: Vec<String> = Vec::new();
        if self.config.load_engine_assembly {
            preload.push(ENGINE_ASSEMBLY.to_string());
        }
        preload.extend(self.config.preload_assemblies.iter().cloned());

        let ctx = self.context_mut(id)?;
        ctx.bind_function_tables(tables)?;
        for name in &preload {
            if let Err(err) = ctx.load_assembly(name) {
                wlog!(ctx.logger(), LogLevel::Warning, "[Weft] preload of {name} failed: {err}");
            }
        }
        Ok(())
    }

    pub fn load_assembly(&mut self, id: ContextId, name: &str) -> WeftResult<()> {
        self.context_mut(id)?.load_assembly(name)
    }

    pub fn load_engine_assembly(&mut self, id: ContextId) -> WeftResult<()> {
        self.context_mut(id)?.load_engine_assembly()
    }

    pub fn create_script_object(
        &mut self,
        id: ContextId,
        class_name: &str,
        native_object: UObjectPtr,
    ) -> WeftResult<ScriptObjectInstanceInfo> {
        self.context_mut(id)?.create_script_object(class_name, native_object)
    }

    pub fn destroy_script_object(&mut self, id: ContextId, instance_id: InstanceId) -> WeftResult<()> {
        self.remove_script_object(id, instance_id)?.dispose()
    }

    pub fn remove_script_object(&mut self, id: ContextId, instance_id: InstanceId) -> WeftResult<RemovedInstance> {
        self.context_mut(id)?.remove_script_object(instance_id)
    }

    pub fn create_script_component(
        &mut self,
        id: ContextId,
        class_name: &str,
        native_component: UObjectPtr,
    ) -> WeftResult<ScriptComponentProxy> {
        self.context_mut(id)?.create_script_component(class_name, native_component)
    }

    pub fn destroy_script_component(&mut self, id: ContextId, instance_id: InstanceId) -> WeftResult<()> {
        self.remove_script_component(id, instance_id)?.dispose()
    }

    pub fn remove_script_component(&mut self, id: ContextId, instance_id: InstanceId) -> WeftResult<RemovedInstance> {
        self.context_mut(id)?.remove_script_component(instance_id)
    }

    pub fn script_component_types(&self, id: ContextId) -> WeftResult<Vec<String>> {
        Ok(self.context(id)?.script_component_types())
    }

    pub fn set_native_function_pointers(
        &mut self,
        id: ContextId,
        class_name: &str,
        pointers: Vec<*const c_void>,
    ) -> WeftResult<()> {
        self.context_mut(id)?.set_native_function_pointers(class_name, pointers)
    }
}

impl Drop for ContextManager {
    fn drop(&mut self) {
        let _ = self.destroy_all_contexts(DEFAULT_CONTEXT_ID);
    }
}
