use std::{env, io::Write};

use eyre::{eyre, Result};

/// build a standardized output path for the given parameters. follows the following cases:
/// - if `output` is the default value (`output`), return `{cwd}/output/local/{filename}`
/// - if `output` is specified, return `/{output}/{filename}`
///
/// `print` is handled by the caller.
pub(crate) fn build_output_path(output: &str, filename: &str) -> Result<String> {
    // if output is the default value, build a path under the working directory
    if output == "output" {
        let cwd = env::current_dir()?
            .into_os_string()
            .into_string()
            .map_err(|_| eyre!("Unable to get current working directory"))?;

        return Ok(format!("{}/output/local/{}", cwd, filename));
    }

    // output is specified, return the path
    Ok(format!("{}/{}", output, filename))
}

/// build the output filename, prefixed with the user's `name` if one was given
pub(crate) fn output_filename(name: &str, filename: &str) -> String {
    if name.is_empty() {
        filename.to_string()
    } else {
        format!("{}-{}", name, filename)
    }
}

/// pass the input to the `less` command
pub(crate) fn print_with_less(input: &str) -> Result<()> {
    let mut child =
        std::process::Command::new("less").stdin(std::process::Stdio::piped()).spawn()?;

    let stdin = child.stdin.as_mut().ok_or_else(|| eyre!("unable to get stdin for less"))?;
    stdin.write_all(input.as_bytes())?;

    child.wait()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_default_local() {
        let path = build_output_path("output", "decompiled.py");
        assert!(path.expect("failed to build output path").ends_with("/output/local/decompiled.py"));
    }

    #[test]
    fn test_output_specified() {
        let path = build_output_path("/some_dir", "decompiled.py");
        assert_eq!(path.expect("failed to build output path"), "/some_dir/decompiled.py".to_string());
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename("", "decompiled.py"), "decompiled.py");
        assert_eq!(output_filename("token", "decompiled.py"), "token-decompiled.py");
    }
}
