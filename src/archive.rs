//! Zip extraction and deterministic zip creation

use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

fn zip_err(e: zip::result::ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// Extract every entry of a zip archive below `output_dir`.
///
/// Entries whose names escape the output directory are skipped.
pub fn extract_zip<R: Read + Seek>(reader: R, output_dir: &Path) -> io::Result<usize> {
    let mut archive = zip::ZipArchive::new(reader).map_err(zip_err)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        let entry_path = match entry.enclosed_name() {
            Some(p) => output_dir.join(p),
            None => continue,
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)?;
        } else {
            if let Some(parent) = entry_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&entry_path)?;
            io::copy(&mut entry, &mut outfile)?;
            written += 1;
        }
    }
    Ok(written)
}

/// Find the single top-level folder produced by an unpack.
///
/// Host-generated archives wrap the tree in one folder with an unpredictable
/// name. When the unpack produced anything else, the directory itself is the
/// root.
pub fn single_root(dir: &Path) -> io::Result<PathBuf> {
    let entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    if let [only] = entries.as_slice() {
        if only.file_type()?.is_dir() {
            return Ok(only.path());
        }
    }
    Ok(dir.to_path_buf())
}

/// Recursively compress `source` into `writer`.
///
/// Entry names are `{prefix}/{relative path}` with `/` separators, written in
/// sorted order with a fixed timestamp so identical trees give identical bytes.
/// Symlinks are skipped.
pub fn zip_dir<W: Write + Seek>(source: &Path, prefix: &str, writer: W) -> io::Result<W> {
    if !source.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source folder {} is missing", source.display()),
        ));
    }

    let mut zip = zip::ZipWriter::new(writer);
    let base = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    zip.add_directory(format!("{}/", prefix), base.unix_permissions(0o755))
        .map_err(zip_err)?;
    add_dir_to_zip(&mut zip, source, prefix, base)?;

    zip.finish().map_err(zip_err)
}

fn add_dir_to_zip<W: Write + Seek>(
    zip: &mut zip::ZipWriter<W>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let file_type = entry.file_type()?;
        let name = format!("{}/{}", prefix, entry.file_name().to_string_lossy());
        let path = entry.path();

        if file_type.is_symlink() {
            continue;
        } else if file_type.is_dir() {
            zip.add_directory(format!("{}/", name), options.unix_permissions(0o755))
                .map_err(zip_err)?;
            add_dir_to_zip(zip, &path, &name, options)?;
        } else {
            zip.start_file(name, options.unix_permissions(0o644))
                .map_err(zip_err)?;
            let mut f = File::open(&path)?;
            io::copy(&mut f, zip)?;
        }
    }
    Ok(())
}

/// Names of every entry in a zip archive, in archive order
pub fn list_zip<R: Read + Seek>(reader: R) -> io::Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(reader).map_err(zip_err)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index(i).map_err(zip_err)?.name().to_string());
    }
    Ok(names)
}
