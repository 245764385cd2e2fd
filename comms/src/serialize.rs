use std::io;

/// A type that can be written into a frame body.
pub trait Serialize<'a> {
    /// Should write the leading part of the body into `buf`.
    ///
    /// # Arguments
    /// * `buf` - The buffer to extend.
    ///
    /// # Returns
    /// A trailing slice to be written as is after `buf`, if any, or an io error
    /// if the value can't be represented on the wire.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}
