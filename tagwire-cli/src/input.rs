use std::error::Error;
use std::fs;
use std::ops::Deref;

/// Contents of an input file.
pub enum Input {
    Owned(Vec<u8>),
    #[cfg(feature = "mmap")]
    Mapped(memmap2::Mmap),
}

impl Deref for Input {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Input::Owned(data) => data,
            #[cfg(feature = "mmap")]
            Input::Mapped(map) => map,
        }
    }
}

/// Read an input file, either into memory or by mapping it if `mmap` is set.
pub fn read_input(path: &str, mmap: bool) -> Result<Input, Box<dyn Error>> {
    if mmap {
        return map_input(path);
    }
    Ok(Input::Owned(fs::read(path)?))
}

#[cfg(feature = "mmap")]
fn map_input(path: &str) -> Result<Input, Box<dyn Error>> {
    let file = fs::File::open(path)?;

    // Safety: The file must not be modified while the mapping exists.
    let map = unsafe { memmap2::Mmap::map(&file)? };
    Ok(Input::Mapped(map))
}

#[cfg(not(feature = "mmap"))]
fn map_input(_path: &str) -> Result<Input, Box<dyn Error>> {
    Err("`--mmap` requires the `mmap` crate feature".into())
}
