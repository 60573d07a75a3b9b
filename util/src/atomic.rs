use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Write `bytes` to `path` so that readers never observe a partial file:
/// the data goes to a sibling temp file first, which is then renamed over `path`.
pub fn atomic_write<T: AsRef<Path>>(path: T, bytes: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".tmp.{}", std::process::id()));
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)
}
