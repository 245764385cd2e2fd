// Primitive number types usable as backing storage for received frames.
pub trait Align1: bytemuck::Pod {}

impl Align1 for u8 {}
impl Align1 for i8 {}
impl Align1 for u16 {}
impl Align1 for i16 {}
impl Align1 for u32 {}
impl Align1 for i32 {}
impl Align1 for u64 {}
impl Align1 for i64 {}
impl Align1 for f32 {}
impl Align1 for f64 {}

// Primitive number types that are 8 bytes aligned, `f64` payloads can be viewed in place.
pub trait Align8: Align1 {}

impl Align8 for u64 {}
impl Align8 for i64 {}
impl Align8 for f64 {}
