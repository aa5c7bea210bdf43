use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn pcimem(args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_pcimem")).args(args).output().unwrap()
}

fn stdout_lines(output: &Output) -> Vec<String> {
	String::from_utf8_lossy(&output.stdout).lines().map(str::to_owned).collect()
}

fn zeroed_file(len: usize) -> NamedTempFile {
	let mut file = NamedTempFile::new().unwrap();
	file.write_all(&vec![0u8; len]).unwrap();
	file.flush().unwrap();
	file
}

#[test]
fn too_few_arguments_prints_usage_and_exits_one() {
	let output = pcimem(&["/definitely/not/here"]);
	assert_eq!(output.status.code(), Some(1));
	assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn illegal_type_exits_two_without_opening() {
	let output = pcimem(&["/definitely/not/here", "0x100", "x"]);
	assert_eq!(output.status.code(), Some(2));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("Illegal data type 'x'."), "{stderr}");
	assert!(!stderr.contains("Can't open file"));
}

#[test]
fn unopenable_file_exits_one() {
	let output = pcimem(&["/definitely/not/here", "0x100"]);
	assert_eq!(output.status.code(), Some(1));
	assert!(String::from_utf8_lossy(&output.stderr).contains("Can't open file /definitely/not/here; reason: ("));
}

#[test]
fn zeroed_dump_scenario() {
	let backing = zeroed_file(64 * 1024);
	let path = backing.path().to_str().unwrap();
	let output = pcimem(&[path, "0x100", "w*4", "--log-level", "off"]);

	assert_eq!(output.status.code(), Some(0));
	assert_eq!(stdout_lines(&output), vec!["0x0100: 0x00000000", "..."]);
}

#[test]
fn byte_write_scenario() {
	let backing = zeroed_file(64 * 1024);
	let path = backing.path().to_str().unwrap();
	let output = pcimem(&[path, "0x10", "b", "0xAB"]);

	assert_eq!(output.status.code(), Some(0));
	let lines = stdout_lines(&output);
	assert!(lines.iter().any(|l| l == "0x0010: 0x00"), "{lines:?}");
	assert!(lines.iter().any(|l| l == "Written 0xAB; readback 0xAB"), "{lines:?}");
	assert!(lines.iter().any(|l| l.contains("opened.")), "{lines:?}");
	assert_eq!(std::fs::read(backing.path()).unwrap()[0x10], 0xAB);
}

#[test]
fn unaligned_word_read_completes() {
	let mut backing = NamedTempFile::new().unwrap();
	backing.write_all(&[0x11u8; 8192]).unwrap();
	backing.flush().unwrap();
	let path = backing.path().to_str().unwrap();
	let output = pcimem(&[path, "0x11", "w", "--log-level", "off"]);

	assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
	assert_eq!(stdout_lines(&output), vec!["0x0011: 0x11111111"]);
}
