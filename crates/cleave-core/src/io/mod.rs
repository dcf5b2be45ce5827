mod mmap;

pub use mmap::MappedInput;
