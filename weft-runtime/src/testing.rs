// In-process fakes of the native function tables.
//
// Compiled for this crate's unit tests and, behind the `testing` feature, for
// downstream integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use weft_ffi::{ArrayPtr, ScriptName, UClassPtr, UObjectPtr};

use crate::error::{WeftError, WeftResult};
use crate::logging::{LogLevel, LogSink, Logger};
use crate::native::{ArrayUtils, FunctionTables, ObjectUtils};

// ---------------------------------------------------------------------------
// FakeObjectUtils
// ---------------------------------------------------------------------------

/// A class table with single inheritance, plus counters for every lookup.
#[derive(Default)]
pub struct FakeObjectUtils {
    by_name: Mutex<HashMap<String, usize>>,
    names: Mutex<HashMap<usize, String>>,
    parents: Mutex<HashMap<usize, usize>>,
    name_lookups: AtomicUsize,
    class_name_queries: AtomicUsize,
    released: Mutex<Vec<usize>>,
}

impl FakeObjectUtils {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeObjectUtils::default())
    }

    /// Register a class at `addr`, optionally derived from `parent`.
    pub fn define_class(&self, name: &str, addr: usize, parent: Option<usize>) {
        self.by_name.lock().unwrap().insert(name.to_string(), addr);
        self.names.lock().unwrap().insert(addr, name.to_string());
        if let Some(parent) = parent {
            self.parents.lock().unwrap().insert(addr, parent);
        }
    }

    pub fn name_lookups(&self) -> usize {
        self.name_lookups.load(Ordering::SeqCst)
    }

    pub fn class_name_queries(&self) -> usize {
        self.class_name_queries.load(Ordering::SeqCst)
    }

    /// Addresses passed to `remove_object_ref`, in call order.
    pub fn released(&self) -> Vec<usize> {
        self.released.lock().unwrap().clone()
    }
}

impl ObjectUtils for FakeObjectUtils {
    fn class_by_name(&self, name: &str) -> UClassPtr {
        self.name_lookups.fetch_add(1, Ordering::SeqCst);
        match self.by_name.lock().unwrap().get(name) {
            Some(&addr) => UClassPtr::from_addr(addr),
            None => UClassPtr::null(),
        }
    }

    fn class_name(&self, class: UClassPtr) -> WeftResult<String> {
        self.class_name_queries.fetch_add(1, Ordering::SeqCst);
        self.names
            .lock()
            .unwrap()
            .get(&class.addr())
            .cloned()
            .ok_or_else(|| WeftError::ClassNotFound(format!("{:#x}", class.addr())))
    }

    fn is_class_child_of(&self, derived: UClassPtr, base: UClassPtr) -> bool {
        let parents = self.parents.lock().unwrap();
        let mut current = Some(derived.addr());
        while let Some(addr) = current {
            if addr == base.addr() {
                return true;
            }
            current = parents.get(&addr).copied();
        }
        false
    }

    fn remove_object_ref(&self, obj: UObjectPtr) {
        self.released.lock().unwrap().push(obj.addr());
    }
}

// ---------------------------------------------------------------------------
// FakeArrayUtils
// ---------------------------------------------------------------------------

/// One element slot. Each typed accessor reads and writes its own field, so an
/// array is only meaningful when used with a single element type.
#[derive(Clone, Default, Debug, PartialEq)]
struct Slot {
    int: i64,
    text: String,
    name: ScriptName,
    object: usize,
}

/// Vec-backed arrays addressed by fake pointers.
#[derive(Default)]
pub struct FakeArrayUtils {
    arrays: Mutex<HashMap<usize, Vec<Slot>>>,
    next: AtomicUsize,
    destroyed: Mutex<Vec<usize>>,
}

impl FakeArrayUtils {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeArrayUtils {
            next: AtomicUsize::new(0x1000),
            ..Default::default()
        })
    }

    pub fn new_array(&self) -> ArrayPtr {
        let addr = self.next.fetch_add(0x10, Ordering::SeqCst);
        self.arrays.lock().unwrap().insert(addr, Vec::new());
        ArrayPtr::from_addr(addr)
    }

    pub fn array_of_ints(&self, values: &[i64]) -> ArrayPtr {
        let array = self.new_array();
        self.with(array, |v| {
            v.extend(values.iter().map(|&int| Slot { int, ..Default::default() }))
        });
        array
    }

    pub fn array_of_strings(&self, values: &[&str]) -> ArrayPtr {
        let array = self.new_array();
        self.with(array, |v| {
            v.extend(values.iter().map(|s| Slot { text: s.to_string(), ..Default::default() }))
        });
        array
    }

    pub fn ints(&self, array: ArrayPtr) -> Vec<i64> {
        self.with(array, |v| v.iter().map(|s| s.int).collect())
    }

    pub fn strings(&self, array: ArrayPtr) -> Vec<String> {
        self.with(array, |v| v.iter().map(|s| s.text.clone()).collect())
    }

    /// Mutate storage behind the adapter's back.
    pub fn push_int_natively(&self, array: ArrayPtr, value: i64) {
        self.with(array, |v| v.push(Slot { int: value, ..Default::default() }));
    }

    pub fn destroyed(&self) -> Vec<usize> {
        self.destroyed.lock().unwrap().clone()
    }

    fn with<R>(&self, array: ArrayPtr, f: impl FnOnce(&mut Vec<Slot>) -> R) -> R {
        let mut arrays = self.arrays.lock().unwrap();
        let slots = arrays
            .get_mut(&array.addr())
            .unwrap_or_else(|| panic!("fake array {:#x} does not exist", array.addr()));
        f(slots)
    }

    fn slot<R>(&self, array: ArrayPtr, index: i32, f: impl FnOnce(&mut Slot) -> R) -> R {
        self.with(array, |v| f(&mut v[index as usize]))
    }

    fn position(&self, array: ArrayPtr, pred: impl Fn(&Slot) -> bool) -> i32 {
        self.with(array, |v| v.iter().position(|s| pred(s)).map_or(-1, |i| i as i32))
    }
}

impl ArrayUtils for FakeArrayUtils {
    fn num(&self, array: ArrayPtr) -> i32 {
        self.with(array, |v| v.len() as i32)
    }

    fn get_u8(&self, array: ArrayPtr, index: i32) -> u8 {
        self.slot(array, index, |s| s.int as u8)
    }

    fn get_i16(&self, array: ArrayPtr, index: i32) -> i16 {
        self.slot(array, index, |s| s.int as i16)
    }

    fn get_i32(&self, array: ArrayPtr, index: i32) -> i32 {
        self.slot(array, index, |s| s.int as i32)
    }

    fn get_i64(&self, array: ArrayPtr, index: i32) -> i64 {
        self.slot(array, index, |s| s.int)
    }

    fn get_string(&self, array: ArrayPtr, index: i32) -> WeftResult<String> {
        Ok(self.slot(array, index, |s| s.text.clone()))
    }

    fn get_name(&self, array: ArrayPtr, index: i32) -> ScriptName {
        self.slot(array, index, |s| s.name)
    }

    fn get_object(&self, array: ArrayPtr, index: i32) -> UObjectPtr {
        self.slot(array, index, |s| UObjectPtr::from_addr(s.object))
    }

    fn set_u8(&self, array: ArrayPtr, index: i32, value: u8) {
        self.slot(array, index, |s| s.int = value as i64);
    }

    fn set_i16(&self, array: ArrayPtr, index: i32, value: i16) {
        self.slot(array, index, |s| s.int = value as i64);
    }

    fn set_i32(&self, array: ArrayPtr, index: i32, value: i32) {
        self.slot(array, index, |s| s.int = value as i64);
    }

    fn set_i64(&self, array: ArrayPtr, index: i32, value: i64) {
        self.slot(array, index, |s| s.int = value);
    }

    fn set_string(&self, array: ArrayPtr, index: i32, value: &str) {
        self.slot(array, index, |s| s.text = value.to_string());
    }

    fn set_name(&self, array: ArrayPtr, index: i32, value: ScriptName) {
        self.slot(array, index, |s| s.name = value);
    }

    fn set_object(&self, array: ArrayPtr, index: i32, value: UObjectPtr) {
        self.slot(array, index, |s| s.object = value.addr());
    }

    fn find_u8(&self, array: ArrayPtr, value: u8) -> i32 {
        self.position(array, |s| s.int as u8 == value)
    }

    fn find_i16(&self, array: ArrayPtr, value: i16) -> i32 {
        self.position(array, |s| s.int as i16 == value)
    }

    fn find_i32(&self, array: ArrayPtr, value: i32) -> i32 {
        self.position(array, |s| s.int as i32 == value)
    }

    fn find_i64(&self, array: ArrayPtr, value: i64) -> i32 {
        self.position(array, |s| s.int == value)
    }

    fn find_string(&self, array: ArrayPtr, value: &str) -> i32 {
        self.position(array, |s| s.text == value)
    }

    fn find_name(&self, array: ArrayPtr, value: ScriptName) -> i32 {
        self.position(array, |s| s.name == value)
    }

    fn find_object(&self, array: ArrayPtr, value: UObjectPtr) -> i32 {
        self.position(array, |s| s.object == value.addr())
    }

    fn add(&self, array: ArrayPtr) -> i32 {
        self.with(array, |v| {
            v.push(Slot::default());
            v.len() as i32 - 1
        })
    }

    fn reset(&self, array: ArrayPtr, new_capacity: i32) {
        self.with(array, |v| {
            v.clear();
            v.reserve(new_capacity.max(0) as usize);
        });
    }

    fn insert(&self, array: ArrayPtr, index: i32) {
        self.with(array, |v| v.insert(index as usize, Slot::default()));
    }

    fn remove_at(&self, array: ArrayPtr, index: i32) {
        self.with(array, |v| {
            v.remove(index as usize);
        });
    }

    fn destroy(&self, array: ArrayPtr) {
        self.destroyed.lock().unwrap().push(array.addr());
        self.arrays.lock().unwrap().remove(&array.addr());
    }
}

// ---------------------------------------------------------------------------
// RecordingLog
// ---------------------------------------------------------------------------

/// Captures every message with its level.
#[derive(Default)]
pub struct RecordingLog {
    messages: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLog {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingLog::default())
    }

    pub fn logger(self: &Arc<Self>) -> Logger {
        Logger::new(self.clone())
    }

    pub fn messages(&self) -> Vec<(LogLevel, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn lines(&self, level: LogLevel) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }
}

impl LogSink for RecordingLog {
    fn write(&self, level: LogLevel, text: &str) {
        self.messages.lock().unwrap().push((level, text.to_string()));
    }
}

// ---------------------------------------------------------------------------
// FakeTables
// ---------------------------------------------------------------------------

/// All three fakes, kept concrete so tests can inspect them after binding.
#[derive(Clone)]
pub struct FakeTables {
    pub object: Arc<FakeObjectUtils>,
    pub log: Arc<RecordingLog>,
    pub array: Arc<FakeArrayUtils>,
}

impl FakeTables {
    pub fn new() -> Self {
        FakeTables {
            object: FakeObjectUtils::new(),
            log: RecordingLog::new(),
            array: FakeArrayUtils::new(),
        }
    }

    pub fn tables(&self) -> FunctionTables {
        FunctionTables {
            object: self.object.clone(),
            log: self.log.clone(),
            array: self.array.clone(),
        }
    }
}

impl Default for FakeTables {
    fn default() -> Self {
        FakeTables::new()
    }
}
