// Host: the status-returning face of the context manager. Every failure is
// turned into a sentinel (false, 0, None) plus exactly one log line.

use std::ffi::c_void;
use std::path::Path;

use weft_runtime::{
    AssemblyCatalog, ContextId, ContextManager, ErrorKind, ExecutionContext, FunctionTables,
    HostConfig, INVALID_CONTEXT_ID, InstanceId, LogLevel, Logger, RemovedInstance,
    ScriptComponentProxy, ScriptObjectInstanceInfo, UObjectPtr, WeftError, wlog,
};

pub struct Host {
    manager: ContextManager,
}

impl Host {
    pub fn new(config: HostConfig, log: Logger, catalog: AssemblyCatalog) -> Self {
        Host {
            manager: ContextManager::new(config, log, catalog),
        }
    }

    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }

    pub fn logger(&self) -> &Logger {
        self.manager.logger()
    }

    /// Log a failed operation at the level its kind calls for.
    pub fn report(&self, operation: &str, err: &WeftError) {
        report(self.manager.logger(), operation, err);
    }

    fn status(&self, operation: &str, result: Result<(), WeftError>) -> bool {
        status(self.manager.logger(), operation, result)
    }

    fn detach<T>(&self, operation: &str, result: Result<T, WeftError>) -> Option<T> {
        result.map_err(|err| self.report(operation, &err)).ok()
    }

    /// Returns the new id, or [`INVALID_CONTEXT_ID`] on failure.
    pub fn create_context(&mut self, requester: ContextId, application_base: Option<&Path>) -> ContextId {
        match self.manager.create_context(requester, application_base) {
            Ok(id) => id,
            Err(err) => {
                self.report("create_context", &err);
                INVALID_CONTEXT_ID
            }
        }
    }

    pub fn destroy_context(&mut self, requester: ContextId, id: ContextId) -> bool {
        match self.remove_context(requester, id) {
            Some(ctx) => finish_destroy_context(self.logger(), ctx),
            None => false,
        }
    }

    /// First half of `destroy_context`: unregister, reporting failures.
    pub fn remove_context(&mut self, requester: ContextId, id: ContextId) -> Option<ExecutionContext> {
        let result = self.manager.remove_context(requester, id);
        self.detach("destroy_context", result)
    }

    /// True when every context unloaded cleanly. Individual unload failures
    /// are logged once each.
    pub fn destroy_all_contexts(&mut self, requester: ContextId) -> bool {
        match self.remove_all_contexts(requester) {
            Some(contexts) => finish_destroy_all_contexts(self.logger(), contexts),
            None => false,
        }
    }

    pub fn remove_all_contexts(&mut self, requester: ContextId) -> Option<Vec<ExecutionContext>> {
        let result = self.manager.remove_all_contexts(requester);
        self.detach("destroy_all_contexts", result)
    }

    pub fn bind_function_tables(&mut self, id: ContextId, tables: FunctionTables) -> bool {
        let result = self.manager.bind_function_tables(id, tables);
        self.status("bind_function_tables", result)
    }

    pub fn load_assembly(&mut self, id: ContextId, name: &str) -> bool {
        let result = self.manager.load_assembly(id, name);
        self.status("load_assembly", result)
    }

    pub fn create_script_object(
        &mut self,
        id: ContextId,
        class_name: &str,
        owner: UObjectPtr,
    ) -> Option<ScriptObjectInstanceInfo> {
        self.manager
            .create_script_object(id, class_name, owner)
            .map_err(|err| self.report("create_script_object", &err))
            .ok()
    }

    pub fn create_script_component(
        &mut self,
        id: ContextId,
        class_name: &str,
        component: UObjectPtr,
    ) -> Option<ScriptComponentProxy> {
        self.manager
            .create_script_component(id, class_name, component)
            .map_err(|err| self.report("create_script_component", &err))
            .ok()
    }

    pub fn destroy_script_object(&mut self, id: ContextId, instance_id: InstanceId) -> bool {
        match self.remove_script_object(id, instance_id) {
            Some(removed) => finish_destroy_instance(self.logger(), "destroy_script_object", removed),
            None => false,
        }
    }

    pub fn remove_script_object(&mut self, id: ContextId, instance_id: InstanceId) -> Option<RemovedInstance> {
        let result = self.manager.remove_script_object(id, instance_id);
        self.detach("destroy_script_object", result)
    }

    pub fn destroy_script_component(&mut self, id: ContextId, instance_id: InstanceId) -> bool {
        match self.remove_script_component(id, instance_id) {
            Some(removed) => finish_destroy_instance(self.logger(), "destroy_script_component", removed),
            None => false,
        }
    }

    pub fn remove_script_component(&mut self, id: ContextId, instance_id: InstanceId) -> Option<RemovedInstance> {
        let result = self.manager.remove_script_component(id, instance_id);
        self.detach("destroy_script_component", result)
    }

    /// `None` when the context cannot be queried; an empty list is a valid answer.
    pub fn script_component_types(&self, id: ContextId) -> Option<Vec<String>> {
        self.manager
            .script_component_types(id)
            .map_err(|err| self.report("list_script_component_types", &err))
            .ok()
    }

    pub fn set_native_function_pointers(
        &mut self,
        id: ContextId,
        class_name: &str,
        pointers: Vec<*const c_void>,
    ) -> bool {
        let result = self.manager.set_native_function_pointers(id, class_name, pointers);
        self.status("set_native_function_pointers", result)
    }

    /// Destroy every context and report how it went.
    pub fn shutdown(&mut self) -> bool {
        let clean = self.destroy_all_contexts(weft_runtime::DEFAULT_CONTEXT_ID);
        wlog!(self.manager.logger(), LogLevel::Display, "[Weft] host shut down");
        clean
    }
}

/// Log a failed operation at the level its kind calls for.
pub fn report(log: &Logger, operation: &str, err: &WeftError) {
    match err.kind() {
        ErrorKind::ProtocolViolation => {
            wlog!(log, LogLevel::Error, "[Weft] protocol violation in {operation}: {err}");
        }
        ErrorKind::LookupMiss | ErrorKind::ConstructionFailure | ErrorKind::Usage => {
            wlog!(log, LogLevel::Warning, "[Weft] {operation} failed: {err}");
        }
        ErrorKind::PartialTeardownFailure => {
            wlog!(log, LogLevel::Error, "[Weft] {operation} failed: {err}");
        }
    }
}

fn status(log: &Logger, operation: &str, result: Result<(), WeftError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            report(log, operation, &err);
            false
        }
    }
}

// The `finish_*` halves run script destructors. They need no `Host`, so the
// boundary can call them after releasing the host lock.

pub fn finish_destroy_context(log: &Logger, mut ctx: ExecutionContext) -> bool {
    status(log, "destroy_context", ctx.unload())
}

pub fn finish_destroy_all_contexts(log: &Logger, contexts: Vec<ExecutionContext>) -> bool {
    ContextManager::unload_all(log, contexts).is_empty()
}

pub fn finish_destroy_instance(log: &Logger, operation: &str, removed: RemovedInstance) -> bool {
    status(log, operation, removed.dispose())
}
