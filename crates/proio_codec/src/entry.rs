//! The interface that typed event entries implement.

use crate::error::CodecResult;
use std::any::Any;
use std::fmt;

/// Upcasting helpers so a `dyn Entry` can be downcast to its concrete type.
///
/// Implemented for every `'static` type; entry implementors never write it.
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Borrow as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Convert a box into `Box<dyn Any>`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A typed message stored in an event.
///
/// Each entry knows its fully qualified type name, can serialize itself
/// to bytes, and can be reset and refilled from bytes so that decoded
/// objects may be recycled.
pub trait Entry: AsAny + Send + Sync + fmt::Debug + 'static {
    /// Fully qualified type name, e.g. `proio.model.eic.Particle`.
    fn type_name(&self) -> &str;

    /// Serialize to bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;

    /// Fill this object from serialized bytes.
    ///
    /// Called on a freshly created or cleared object.
    fn merge_from(&mut self, bytes: &[u8]) -> CodecResult<()>;

    /// Reset every field to its default.
    fn clear(&mut self);

    /// Boxed deep copy.
    fn clone_entry(&self) -> Box<dyn Entry>;
}

/// An entry type with a static name and a default constructor, which is
/// what the registry needs to build decoders.
pub trait EntryType: Entry + Default + Sized {
    /// Fully qualified type name.
    const TYPE_NAME: &'static str;
}

impl dyn Entry {
    /// Downcast to a concrete entry type.
    pub fn downcast_ref<T: Entry>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete entry type.
    pub fn downcast_mut<T: Entry>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Returns true if the concrete type is `T`.
    pub fn is<T: Entry>(&self) -> bool {
        self.as_any().is::<T>()
    }
}
