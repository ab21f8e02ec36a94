use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Reads a corpus file and returns its non-blank lines.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
/// - Drops lines that are empty or whitespace only
pub(crate) fn read_corpus_lines<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let contents = fs::read_to_string(filename)?;
	Ok(contents
		.lines()
		.filter(|line| !line.trim().is_empty())
		.map(str::to_owned)
		.collect())
}

/// Extension of the artifact cached next to a corpus file.
pub(crate) const ARTIFACT_EXTENSION: &str = "bin";

/// Path of the artifact cached for a corpus: same directory and stem,
/// `.bin` extension (`data/names.txt` → `data/names.bin`).
pub(crate) fn cached_artifact_path(corpus_path: &Path) -> io::Result<PathBuf> {
	if corpus_path.file_name().is_none() {
		return Err(io::Error::new(
			io::ErrorKind::InvalidInput,
			format!("{} does not name a corpus file", corpus_path.display()),
		));
	}
	Ok(corpus_path.with_extension(ARTIFACT_EXTENSION))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cached_artifact_sits_next_to_corpus() {
		assert_eq!(cached_artifact_path(Path::new("data/corpus.txt")).unwrap(), PathBuf::from("data/corpus.bin"));
		assert_eq!(cached_artifact_path(Path::new("names")).unwrap(), PathBuf::from("names.bin"));
	}

	#[test]
	fn corpus_path_must_name_a_file() {
		let err = cached_artifact_path(Path::new("data/..")).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
	}

	#[test]
	fn corpus_lines_skip_blank_lines() {
		let dir = tempdir::TempDir::new("rs-ngram-io").unwrap();
		let path = dir.path().join("corpus.txt");
		fs::write(&path, "first line\n\n   \r\nsecond line\r\n").unwrap();

		let lines = read_corpus_lines(&path).unwrap();
		assert_eq!(lines, vec!["first line".to_owned(), "second line".to_owned()]);
	}
}
