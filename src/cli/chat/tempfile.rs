use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::env::temp_dir;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

const RETRIES: usize = 16;

fn random_name(rng: &mut StdRng, base: &str, extension: &str) -> String {
    let mut suffix = [0u8; 16];

    rng.fill_bytes(&mut suffix);

    let hex: String = suffix.iter().map(|b| format!("{:02x}", b)).collect();

    format!("{}{}{}", base, hex, extension)
}

/// Creates `base || hex || extension` in `dir`, readable only by the current
/// user. Gives up with `ErrorKind::AlreadyExists` after several collisions.
fn create_temp_file(dir: &Path, base: &str, extension: &str) -> io::Result<(PathBuf, File)> {
    let mut rng = StdRng::from_entropy();

    for _ in 0..RETRIES {
        let path = dir.join(random_name(&mut rng, base, extension));

        let open_result = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path);

        match open_result {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }

    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("failed to create a private tempfile after {} tries", RETRIES),
    ))
}

/// A temporary file which is removed when dropped.
pub(crate) struct Tempfile {
    path: PathBuf,
    file: File,
}

impl Tempfile {
    pub(crate) fn with_base_and_ext(base: &str, extension: &str) -> io::Result<Tempfile> {
        Self::new(&temp_dir(), base, extension)
    }

    pub(crate) fn new(dir: &Path, base: &str, extension: &str) -> io::Result<Tempfile> {
        let (path, file) = create_temp_file(dir, base, extension)?;

        Ok(Tempfile { path, file })
    }

    pub(crate) fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    pub(crate) fn path_buf(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl Drop for Tempfile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
