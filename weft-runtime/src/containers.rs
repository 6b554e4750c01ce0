// Typed view over a native dynamic array.
// Storage lives on the native side; every element access goes through the
// bound `ArrayUtils`. Nothing is copied into script memory except the element
// values being read.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

use weft_ffi::{ArrayPtr, ScriptName, UObjectPtr};

use crate::error::{WeftError, WeftResult};
use crate::handle::{NativeHandle, ReleaseHook};
use crate::native::ArrayUtils;

// ---------------------------------------------------------------------------
// ArrayElement
// ---------------------------------------------------------------------------

/// What an element accessor sees: the utilities, the array and the release
/// hook for object elements.
pub struct ArrayAccess<'a> {
    utils: &'a dyn ArrayUtils,
    array: ArrayPtr,
    hook: Option<&'a Arc<ReleaseHook>>,
}

impl<'a> ArrayAccess<'a> {
    #[inline]
    pub fn utils(&self) -> &'a dyn ArrayUtils {
        self.utils
    }

    #[inline]
    pub fn array(&self) -> ArrayPtr {
        self.array
    }

    /// A fresh owning handle to the object at `index`.
    pub fn object_at(&self, index: i32) -> NativeHandle {
        let ptr: UObjectPtr = self.utils.get_object(self.array, index);
        NativeHandle::new(ptr, true, self.hook.cloned())
    }
}

/// Types that can be stored in a [`NativeArray`].
pub trait ArrayElement: Sized {
    fn read(access: &ArrayAccess<'_>, index: i32) -> WeftResult<Self>;

    fn write(&self, access: &ArrayAccess<'_>, index: i32);

    /// Native linear search; -1 when absent.
    fn find_in(&self, access: &ArrayAccess<'_>) -> i32;
}

macro_rules! impl_array_element_primitive {
    ($ty:ty, $get:ident, $set:ident, $find:ident) => {
        impl ArrayElement for $ty {
            #[inline]
            fn read(access: &ArrayAccess<'_>, index: i32) -> WeftResult<Self> {
                Ok(access.utils.$get(access.array, index))
            }

            #[inline]
            fn write(&self, access: &ArrayAccess<'_>, index: i32) {
                access.utils.$set(access.array, index, *self)
            }

            #[inline]
            fn find_in(&self, access: &ArrayAccess<'_>) -> i32 {
                access.utils.$find(access.array, *self)
            }
        }
    };
}

impl_array_element_primitive!(u8, get_u8, set_u8, find_u8);
impl_array_element_primitive!(i16, get_i16, set_i16, find_i16);
impl_array_element_primitive!(i32, get_i32, set_i32, find_i32);
impl_array_element_primitive!(i64, get_i64, set_i64, find_i64);
impl_array_element_primitive!(ScriptName, get_name, set_name, find_name);

// bool shares the byte accessors.
impl ArrayElement for bool {
    fn read(access: &ArrayAccess<'_>, index: i32) -> WeftResult<Self> {
        Ok(access.utils.get_u8(access.array, index) != 0)
    }

    fn write(&self, access: &ArrayAccess<'_>, index: i32) {
        access.utils.set_u8(access.array, index, *self as u8)
    }

    fn find_in(&self, access: &ArrayAccess<'_>) -> i32 {
        access.utils.find_u8(access.array, *self as u8)
    }
}

impl ArrayElement for String {
    fn read(access: &ArrayAccess<'_>, index: i32) -> WeftResult<Self> {
        access.utils.get_string(access.array, index)
    }

    fn write(&self, access: &ArrayAccess<'_>, index: i32) {
        access.utils.set_string(access.array, index, self)
    }

    fn find_in(&self, access: &ArrayAccess<'_>) -> i32 {
        access.utils.find_string(access.array, self)
    }
}

// ---------------------------------------------------------------------------
// NativeArray<T>
// ---------------------------------------------------------------------------

/// A typed view over a native dynamic array.
///
/// All operations take `&self`; a modification counter detects structural
/// changes made through this view while an iterator is live. Changes made by
/// native code directly are not detected.
pub struct NativeArray<T: ArrayElement> {
    array: ArrayPtr,
    utils: Arc<dyn ArrayUtils>,
    hook: Option<Arc<ReleaseHook>>,
    owns: bool,
    modifications: Cell<u64>,
    _marker: PhantomData<T>,
}

impl<T: ArrayElement> NativeArray<T> {
    /// Take ownership of a native array; it is destroyed when this value drops.
    ///
    /// `hook` is the owning context's release hook. Object elements are
    /// released through it, and once it is revoked the array is no longer
    /// destroyed natively.
    pub fn owned(array: ArrayPtr, utils: Arc<dyn ArrayUtils>, hook: Option<Arc<ReleaseHook>>) -> Self {
        NativeArray::with_ownership(array, utils, hook, true)
    }

    /// View an array owned by native code. Never destroyed from here.
    pub fn borrowed(array: ArrayPtr, utils: Arc<dyn ArrayUtils>, hook: Option<Arc<ReleaseHook>>) -> Self {
        NativeArray::with_ownership(array, utils, hook, false)
    }

    fn with_ownership(
        array: ArrayPtr,
        utils: Arc<dyn ArrayUtils>,
        hook: Option<Arc<ReleaseHook>>,
        owns: bool,
    ) -> Self {
        NativeArray {
            array,
            utils,
            hook,
            owns,
            modifications: Cell::new(0),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn raw(&self) -> ArrayPtr {
        self.array
    }

    fn access(&self) -> ArrayAccess<'_> {
        ArrayAccess {
            utils: &*self.utils,
            array: self.array,
            hook: self.hook.as_ref(),
        }
    }

    fn touch(&self) {
        self.modifications.set(self.modifications.get().wrapping_add(1));
    }

    fn check_index(&self, index: i32, len: i32) -> WeftResult<()> {
        if index < 0 || index >= len {
            return Err(WeftError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    pub fn count(&self) -> i32 {
        self.utils.num(self.array)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn get(&self, index: i32) -> WeftResult<T> {
        self.check_index(index, self.count())?;
        T::read(&self.access(), index)
    }

    pub fn set(&self, index: i32, value: &T) -> WeftResult<()> {
        self.check_index(index, self.count())?;
        value.write(&self.access(), index);
        self.touch();
        Ok(())
    }

    /// Append `value`; returns its index.
    pub fn add(&self, value: &T) -> i32 {
        let index = self.utils.add(self.array);
        value.write(&self.access(), index);
        self.touch();
        index
    }

    /// Insert `value` before `index`. `index == count()` appends.
    pub fn insert(&self, index: i32, value: &T) -> WeftResult<()> {
        let len = self.count();
        if index < 0 || index > len {
            return Err(WeftError::IndexOutOfRange { index, len });
        }
        self.utils.insert(self.array, index);
        value.write(&self.access(), index);
        self.touch();
        Ok(())
    }

    pub fn remove_at(&self, index: i32) -> WeftResult<()> {
        self.check_index(index, self.count())?;
        self.utils.remove_at(self.array, index);
        self.touch();
        Ok(())
    }

    /// Remove the first element equal to `value`. False when there is none.
    pub fn remove(&self, value: &T) -> bool {
        let index = self.find(value);
        if index < 0 {
            return false;
        }
        self.utils.remove_at(self.array, index);
        self.touch();
        true
    }

    /// Index of the first element equal to `value`, or -1.
    pub fn find(&self, value: &T) -> i32 {
        value.find_in(&self.access())
    }

    pub fn contains(&self, value: &T) -> bool {
        self.find(value) >= 0
    }

    pub fn clear(&self) {
        self.reset(0);
    }

    /// Remove every element, keeping room for `capacity`.
    pub fn reset(&self, capacity: i32) {
        self.utils.reset(self.array, capacity);
        self.touch();
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            array: self,
            index: 0,
            expected: self.modifications.get(),
            done: false,
        }
    }

    /// Read every element. Stops at the first error.
    pub fn to_vec(&self) -> WeftResult<Vec<T>> {
        self.iter().collect()
    }

    /// Destroy the native array now instead of at drop.
    pub fn dispose(self) {
        drop(self);
    }
}

impl<T: ArrayElement> Drop for NativeArray<T> {
    fn drop(&mut self) {
        if !self.owns || self.array.is_null() {
            return;
        }
        let live = self.hook.as_ref().is_none_or(|hook| hook.is_open());
        if live {
            self.utils.destroy(self.array);
        }
        self.array = ArrayPtr::null();
    }
}

impl<'a, T: ArrayElement> IntoIterator for &'a NativeArray<T> {
    type Item = WeftResult<T>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

/// Yields `Err(InvalidatedIterator)` once if the array was modified through its
/// view after the iterator was created, then ends.
pub struct Iter<'a, T: ArrayElement> {
    array: &'a NativeArray<T>,
    index: i32,
    expected: u64,
    done: bool,
}

impl<T: ArrayElement> Iterator for Iter<'_, T> {
    type Item = WeftResult<T>;

    fn next(&mut self) -> Option<WeftResult<T>> {
        if self.done {
            return None;
        }
        if self.array.modifications.get() != self.expected {
            self.done = true;
            return Some(Err(WeftError::InvalidatedIterator));
        }
        if self.index >= self.array.count() {
            self.done = true;
            return None;
        }
        let item = T::read(&self.array.access(), self.index);
        self.index += 1;
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testing::{FakeArrayUtils, FakeObjectUtils};
    use crate::wrappers::{ObjectWrapper, UObject};

    fn ints(fake: &Arc<FakeArrayUtils>, values: &[i64]) -> NativeArray<i32> {
        NativeArray::owned(fake.array_of_ints(values), fake.clone(), None)
    }

    #[test]
    fn add_returns_index_and_writes_value() {
        let fake = FakeArrayUtils::new();
        let arr = ints(&fake, &[1, 2]);
        assert_eq!(arr.add(&9), 2);
        assert_eq!(fake.ints(arr.raw()), vec![1, 2, 9]);
        assert_eq!(arr.get(2).unwrap(), 9);
    }

    #[test]
    fn insert_places_value_before_index() {
        let fake = FakeArrayUtils::new();
        let arr = ints(&fake, &[1, 3]);
        arr.insert(1, &2).unwrap();
        arr.insert(3, &4).unwrap();
        assert_eq!(arr.to_vec().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_access_is_rejected_before_native_call() {
        let fake = FakeArrayUtils::new();
        let arr = ints(&fake, &[1]);
        assert!(matches!(arr.get(1), Err(WeftError::IndexOutOfRange { index: 1, len: 1 })));
        assert!(arr.get(-1).is_err());
        assert!(arr.set(5, &0).is_err());
        assert!(arr.insert(2, &0).is_err());
        assert!(arr.remove_at(1).is_err());
    }

    #[test]
    fn remove_and_find() {
        let fake = FakeArrayUtils::new();
        let arr = ints(&fake, &[4, 5, 6, 5]);
        assert_eq!(arr.find(&5), 1);
        assert!(arr.remove(&5));
        assert_eq!(fake.ints(arr.raw()), vec![4, 6, 5]);
        assert!(!arr.remove(&7));
        assert_eq!(arr.find(&7), -1);
    }

    #[test]
    fn clear_empties_the_array() {
        let fake = FakeArrayUtils::new();
        let arr = ints(&fake, &[1, 2, 3]);
        arr.clear();
        assert!(arr.is_empty());
    }

    #[test]
    fn bool_uses_byte_storage() {
        let fake = FakeArrayUtils::new();
        let arr: NativeArray<bool> = NativeArray::owned(fake.new_array(), fake.clone(), None);
        arr.add(&true);
        arr.add(&false);
        assert_eq!(fake.ints(arr.raw()), vec![1, 0]);
        assert_eq!(arr.find(&false), 1);
        assert!(arr.get(0).unwrap());
    }

    #[test]
    fn strings_round_trip() {
        let fake = FakeArrayUtils::new();
        let arr: NativeArray<String> =
            NativeArray::owned(fake.array_of_strings(&["a", "b"]), fake.clone(), None);
        arr.set(1, &"z".to_string()).unwrap();
        assert_eq!(fake.strings(arr.raw()), vec!["a", "z"]);
        assert!(arr.contains(&"a".to_string()));
    }

    #[test]
    fn object_elements_get_fresh_owning_handles() {
        let fake = FakeArrayUtils::new();
        let objects = FakeObjectUtils::new();
        let hook = ReleaseHook::new(objects.clone());
        let arr: NativeArray<UObject> = NativeArray::owned(fake.new_array(), fake.clone(), Some(hook));
        arr.add(&UObject::from_native(NativeHandle::borrowed(UObjectPtr::from_addr(0x70))));

        let a = arr.get(0).unwrap();
        let b = arr.get(0).unwrap();
        assert_eq!(a, b);
        assert!(a.native().owns());
        drop(a);
        drop(b);
        assert_eq!(objects.released(), vec![0x70, 0x70]);
    }

    #[test]
    fn mutation_invalidates_live_iterator() {
        let fake = FakeArrayUtils::new();
        let arr = ints(&fake, &[1, 2, 3]);
        let mut it = arr.iter();
        assert_eq!(it.next().unwrap().unwrap(), 1);
        arr.add(&4);
        assert!(matches!(it.next(), Some(Err(WeftError::InvalidatedIterator))));
        assert!(it.next().is_none());
    }

    #[test]
    fn index_set_counts_as_modification() {
        let fake = FakeArrayUtils::new();
        let arr = ints(&fake, &[1, 2]);
        let mut it = arr.iter();
        arr.set(0, &7).unwrap();
        assert!(matches!(it.next(), Some(Err(WeftError::InvalidatedIterator))));
    }

    #[test]
    fn native_side_mutation_is_not_detected() {
        let fake = FakeArrayUtils::new();
        let arr = ints(&fake, &[1]);
        let mut it = arr.iter();
        fake.push_int_natively(arr.raw(), 2);
        assert_eq!(it.next().unwrap().unwrap(), 1);
        assert_eq!(it.next().unwrap().unwrap(), 2);
        assert!(it.next().is_none());
    }

    #[test]
    fn drop_destroys_owned_array_once() {
        let fake = FakeArrayUtils::new();
        let arr = ints(&fake, &[1]);
        let raw = arr.raw();
        arr.dispose();
        assert_eq!(fake.destroyed(), vec![raw.addr()]);

        let borrowed: NativeArray<i32> = NativeArray::borrowed(fake.new_array(), fake.clone(), None);
        drop(borrowed);
        assert_eq!(fake.destroyed().len(), 1);
    }

    #[test]
    fn revoked_hook_skips_native_destroy() {
        let fake = FakeArrayUtils::new();
        let hook = ReleaseHook::new(FakeObjectUtils::new());
        let arr: NativeArray<i32> = NativeArray::owned(fake.new_array(), fake.clone(), Some(hook.clone()));
        hook.revoke();
        drop(arr);
        assert!(fake.destroyed().is_empty());
    }

    proptest! {
        #[test]
        fn added_values_are_found_and_removable(
            seed in proptest::collection::vec(-1000i64..1000, 0..16),
            x in 1000i32..2000,
        ) {
            let fake = FakeArrayUtils::new();
            let arr = ints(&fake, &seed);
            arr.add(&x);
            let index = arr.find(&x);
            prop_assert!(index != -1);
            arr.remove_at(index).unwrap();
            prop_assert!(!arr.contains(&x));
        }
    }
}
