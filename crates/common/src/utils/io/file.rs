use std::{
    env,
    fs::File,
    io::{Read, Write},
    path::Path,
};

use eyre::Result;
use tracing::debug;

/// Convert a long path to a short path.
///
/// ```no_run
/// use xian_common::utils::io::file::short_path;
///
/// let path = "/some/long/path/that/is/cwd/something.json";
/// let short_path = short_path(path);
/// assert_eq!(short_path, "./something.json");
/// ```
pub fn short_path(path: &str) -> String {
    match env::current_dir() {
        Ok(dir) => path.replace(&dir.into_os_string().into_string().unwrap_or_default(), "."),
        Err(_) => path.to_owned(),
    }
}

/// Write contents to a file on the disc, creating parent directories as needed.
///
/// ```no_run
/// use xian_common::utils::io::file::write_file;
///
/// let path = "/tmp/test.txt";
/// let contents = "Hello, World!";
/// let result = write_file(path, contents);
/// ```
pub fn write_file(path_str: &str, contents: &str) -> Result<()> {
    let path = Path::new(path_str);

    // Create the directory if it doesn't exist
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())?;

    Ok(())
}

/// Read contents from a file on the disc
///
/// ```no_run
/// use xian_common::utils::io::file::read_file;
///
/// let path = "/tmp/test.txt";
/// let contents = read_file(path);
/// ```
pub fn read_file(path: &str) -> Result<String> {
    let path = Path::new(path);
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Read a file as bytes and decode it lossily, so that arbitrary (binary) files
/// can still be handed to tools that accept untrusted text.
pub fn read_file_lossy(path: &str) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Resolve a CLI target: if `target` names an existing file its contents are
/// returned, otherwise the target itself is treated as literal input.
///
/// ```
/// use xian_common::utils::io::file::read_target;
///
/// let contents = read_target("balances = Hash()").expect("literal targets never fail");
/// assert_eq!(contents, "balances = Hash()");
/// ```
pub fn read_target(target: &str) -> Result<String> {
    if Path::new(target).is_file() {
        debug!("reading target from file '{}'", short_path(target));
        return read_file_lossy(target);
    }

    Ok(target.to_string())
}

/// Delete a file or directory from the disc. Returns `true` if nothing is
/// left at `path` afterwards.
///
/// ```no_run
/// use xian_common::utils::io::file::delete_path;
///
/// let path = "/tmp/test.txt";
/// let result = delete_path(path);
/// ```
pub fn delete_path(path: &str) -> bool {
    let path = Path::new(path);
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else if path.exists() {
        std::fs::remove_file(path)
    } else {
        Ok(())
    };

    result.is_ok()
}
