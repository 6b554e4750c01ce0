// The entry!() exports, called the way the native host calls them.

use std::ffi::c_void;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use weft::ffi::{
    ArrayUtilsTable, LogUtilsTable, ObjectUtilsTable, ScriptComponentProxy, ScriptObjectInstanceInfo,
};
use weft::prelude::*;

weft::entry!();

use __weft_entry::*;

struct Beacon {
    base: ScriptBase,
}

#[script_component(assembly = "Exports")]
impl ScriptComponent for Beacon {
    fn new(base: ScriptBase) -> ScriptResult<Self> {
        Ok(Beacon { base })
    }

    fn base(&self) -> &ScriptBase {
        &self.base
    }

    fn on_register(&mut self) {
        wlog!(self.base.log(), LogLevel::Display, "beacon {} registered", self.instance_id());
    }
}

struct Turret {
    base: ScriptBase,
}

#[script_object(name = "Exports.Turret", assembly = "Exports")]
impl ScriptObject for Turret {
    fn new(base: ScriptBase) -> ScriptResult<Self> {
        Ok(Turret { base })
    }

    fn base(&self) -> &ScriptBase {
        &self.base
    }

    fn tick(&mut self, delta_time: f32) {
        if delta_time < 0.0 {
            panic!("negative delta");
        }
    }
}

/// Adopts its owner, so dropping it releases the owner through the host.
struct Holder {
    base: ScriptBase,
    _owner: NativeHandle,
}

#[script_object(name = "Exports.Holder", assembly = "Exports")]
impl ScriptObject for Holder {
    fn new(base: ScriptBase) -> ScriptResult<Self> {
        let owner = base.services().adopt_object(base.native().ptr())?;
        Ok(Holder { base, _owner: owner })
    }

    fn base(&self) -> &ScriptBase {
        &self.base
    }
}

// The host is process-global; tests take turns.
static SERIAL: Mutex<()> = Mutex::new(());
static LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lines() -> Vec<String> {
    LINES.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

unsafe extern "C" fn record(text: *const u8, len: u32) {
    let bytes = unsafe { std::slice::from_raw_parts(text, len as usize) };
    LINES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(String::from_utf8_lossy(bytes).into_owned());
}

/// Context the release callback queries, and what each query returned.
static WATCHED: AtomicI32 = AtomicI32::new(0);
static RELEASES: Mutex<Vec<(usize, i32)>> = Mutex::new(Vec::new());

/// Releases an object by calling straight back into the exports.
unsafe extern "C" fn release_and_call_back(obj: UObjectPtr) {
    let ctx = WATCHED.load(Ordering::SeqCst);
    let seen = unsafe { weft_list_script_component_types(ctx, None, std::ptr::null_mut()) };
    RELEASES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push((obj.addr(), seen));
}

fn log_table() -> LogUtilsTable {
    LogUtilsTable {
        fatal: None,
        error: Some(record),
        warning: Some(record),
        display: Some(record),
        log: Some(record),
        verbose: None,
        very_verbose: None,
    }
}

unsafe extern "C" fn collect(user_data: *mut c_void, text: *const u8, len: u32) {
    let out = unsafe { &mut *(user_data as *mut Vec<String>) };
    let bytes = unsafe { std::slice::from_raw_parts(text, len as usize) };
    out.push(String::from_utf8_lossy(bytes).into_owned());
}

fn start() -> i32 {
    let log: &'static LogUtilsTable = Box::leak(Box::new(log_table()));
    assert!(unsafe { weft_startup(log, std::ptr::null(), 0) });
    let ctx = unsafe { weft_create_context(1, std::ptr::null(), 0) };
    assert_ne!(ctx, 0);

    let object = ObjectUtilsTable {
        remove_object_ref: Some(release_and_call_back),
        ..ObjectUtilsTable::default()
    };
    let array = ArrayUtilsTable::default();
    assert!(unsafe { weft_bind_function_tables(ctx, &object, log, &array) });
    ctx
}

#[test]
fn calls_without_a_host_return_sentinels() {
    let _turn = serial();
    weft_shutdown();
    assert_eq!(unsafe { weft_create_context(1, std::ptr::null(), 0) }, 0);
    assert!(!weft_destroy_all_contexts(1));
    assert_eq!(
        unsafe { weft_list_script_component_types(2, None, std::ptr::null_mut()) },
        -1
    );
}

#[test]
fn full_session_through_exports() {
    let _turn = serial();
    let ctx = start();

    let name = "Exports";
    assert!(unsafe { weft_load_assembly(ctx, name.as_ptr(), name.len() as u32) });

    let class = "Exports.Turret";
    let mut info = ScriptObjectInstanceInfo::default();
    assert!(unsafe {
        weft_create_script_object(ctx, class.as_ptr(), class.len() as u32, UObjectPtr::null(), &mut info)
    });
    assert_eq!(info.instance_id, 1);

    // A panicking hook is contained and logged.
    unsafe { info.tick.unwrap()(info.instance, -1.0) };
    assert!(lines().iter().any(|l| l.contains("negative delta")));

    let class = "Exports.Beacon";
    let mut proxy = ScriptComponentProxy::default();
    assert!(unsafe {
        weft_create_script_component(ctx, class.as_ptr(), class.len() as u32, UObjectPtr::null(), &mut proxy)
    });
    unsafe { proxy.on_register.unwrap()(proxy.instance) };
    assert!(lines().contains(&"beacon 2 registered".to_string()));

    let mut names: Vec<String> = Vec::new();
    let count = unsafe {
        weft_list_script_component_types(ctx, Some(collect), &mut names as *mut Vec<String> as *mut c_void)
    };
    assert_eq!(count, 1);
    assert_eq!(names, vec!["Exports.Beacon".to_string()]);

    let native = "Actor";
    let pointers = [0x1000 as *const c_void, 0x2000 as *const c_void];
    assert!(unsafe {
        weft_set_native_function_pointers(ctx, native.as_ptr(), native.len() as u32, pointers.as_ptr(), 2)
    });

    assert!(weft_destroy_script_object(ctx, info.instance_id));
    assert!(!weft_destroy_script_object(ctx, info.instance_id));
    assert!(weft_destroy_script_component(ctx, proxy.instance_id));

    assert!(!weft_destroy_context(ctx, ctx));
    assert!(lines().iter().any(|l| l.starts_with("[Weft] protocol violation in destroy_context")));
    assert!(weft_destroy_context(1, ctx));

    weft_shutdown();
    assert!(lines().contains(&"[Weft] host shut down".to_string()));
}

#[test]
fn destructor_callbacks_may_call_exports_again() {
    let _turn = serial();
    let ctx = start();
    WATCHED.store(ctx, Ordering::SeqCst);
    RELEASES.lock().unwrap_or_else(PoisonError::into_inner).clear();

    let name = "Exports";
    assert!(unsafe { weft_load_assembly(ctx, name.as_ptr(), name.len() as u32) });
    let class = "Exports.Holder";
    let mut infos = Vec::new();
    for owner in [0x5150, 0x5160] {
        let mut info = ScriptObjectInstanceInfo::default();
        assert!(unsafe {
            weft_create_script_object(ctx, class.as_ptr(), class.len() as u32, UObjectPtr::from_addr(owner), &mut info)
        });
        infos.push(info);
    }

    // Each release queries the host while the destroy export is in flight.
    assert!(weft_destroy_script_object(ctx, infos[0].instance_id));
    assert!(weft_destroy_context(1, ctx));
    let releases = RELEASES.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(releases, vec![(0x5150, 1), (0x5160, -1)]);

    weft_shutdown();
}

#[test]
fn startup_twice_is_rejected_and_bad_config_fails() {
    let _turn = serial();
    let _ctx = start();
    let log = log_table();
    assert!(!unsafe { weft_startup(&log, std::ptr::null(), 0) });
    weft_shutdown();

    let path = "/no/such/weft.toml";
    assert!(!unsafe { weft_startup(&log, path.as_ptr(), path.len() as u32) });
    assert!(lines().iter().any(|l| l.contains("startup failed") && l.contains(path)));
}
