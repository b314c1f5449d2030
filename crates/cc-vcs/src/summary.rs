use cc_core::types::{FileStatus, FileSummary};

const DEV_NULL: &str = "/dev/null";

#[derive(Default)]
struct FileBlock {
    header_old: Option<String>,
    header_new: Option<String>,
    from: Option<String>,
    to: Option<String>,
    rename_from: Option<String>,
    rename_to: Option<String>,
    new_file: bool,
    deleted: bool,
    in_hunk: bool,
    additions: u32,
    deletions: u32,
}

impl FileBlock {
    fn start(header: &str) -> Self {
        let (header_old, header_new) = split_git_header(header);
        Self {
            header_old,
            header_new,
            ..Self::default()
        }
    }

    fn finish(self) -> Option<FileSummary> {
        let from = self.rename_from.or(self.from).or(self.header_old)?;
        let to = self.rename_to.or(self.to).or(self.header_new)?;
        let added = self.new_file || from == DEV_NULL;
        let deleted = self.deleted || to == DEV_NULL;
        let (path, status, old_path) = if added {
            (to, FileStatus::Added, None)
        } else if deleted {
            (from, FileStatus::Deleted, None)
        } else if from != to {
            (to, FileStatus::Renamed, Some(from))
        } else {
            (to, FileStatus::Modified, None)
        };
        Some(FileSummary {
            path,
            old_path,
            status,
            additions: self.additions,
            deletions: self.deletions,
        })
    }

    fn line(&mut self, line: &str) {
        if self.in_hunk {
            if line.starts_with('+') {
                self.additions += 1;
            } else if line.starts_with('-') {
                self.deletions += 1;
            }
            return;
        }
        if line.starts_with("@@") {
            self.in_hunk = true;
        } else if line.starts_with("new file mode") {
            self.new_file = true;
        } else if line.starts_with("deleted file mode") {
            self.deleted = true;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            self.rename_from = Some(unquote(path));
        } else if let Some(path) = line.strip_prefix("rename to ") {
            self.rename_to = Some(unquote(path));
        } else if let Some(path) = line.strip_prefix("--- ") {
            self.from = Some(strip_side(path, "a/"));
        } else if let Some(path) = line.strip_prefix("+++ ") {
            self.to = Some(strip_side(path, "b/"));
        }
    }
}

/// Per-file summaries of a unified git diff, in diff order.
pub fn parse_file_summaries(diff: &str) -> Vec<FileSummary> {
    let mut files = Vec::new();
    let mut current: Option<FileBlock> = None;
    for line in diff.lines() {
        if let Some(header) = line.strip_prefix("diff --git ") {
            if let Some(summary) = current.take().and_then(FileBlock::finish) {
                files.push(summary);
            }
            current = Some(FileBlock::start(header));
            continue;
        }
        if let Some(block) = current.as_mut() {
            block.line(line);
        }
    }
    if let Some(summary) = current.and_then(FileBlock::finish) {
        files.push(summary);
    }
    files
}

fn strip_side(path: &str, prefix: &str) -> String {
    let path = unquote(path.trim_end_matches('\t'));
    if path == DEV_NULL {
        return path;
    }
    path.strip_prefix(prefix).map_or(path.clone(), str::to_string)
}

/// Decodes git's C-style quoting, including `\ooo` octal bytes.
fn unquote(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) else {
        return path.to_string();
    };
    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        rest = tail;
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        let Some((&escape, tail)) = rest.split_first() else {
            bytes.push(b'\\');
            break;
        };
        rest = tail;
        match escape {
            b'0'..=b'7' => {
                let digits = rest.iter().take(2).take_while(|digit| matches!(**digit, b'0'..=b'7')).count();
                let octal = std::iter::once(escape).chain(rest[..digits].iter().copied());
                let value = octal.fold(0u32, |acc, digit| acc * 8 + u32::from(digit - b'0'));
                bytes.push(u8::try_from(value).unwrap_or(b'?'));
                rest = &rest[digits..];
            }
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0c),
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'v' => bytes.push(0x0b),
            other => bytes.push(other),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Splits `a/<old> b/<new>`. Identical halves are preferred so paths that
/// themselves contain ` b/` still split correctly.
fn split_git_header(header: &str) -> (Option<String>, Option<String>) {
    if header.len() > 1 && (header.len() - 1) % 2 == 0 {
        let half = (header.len() - 1) / 2;
        if let (Some(left), Some(right)) = (header.get(..half), header.get(half + 1..)) {
            if let (Some(old), Some(new)) = (left.strip_prefix("a/"), right.strip_prefix("b/")) {
                if old == new {
                    return (Some(old.to_string()), Some(new.to_string()));
                }
            }
        }
    }
    match header.find(" b/").or_else(|| header.find(" \"b/")) {
        Some(index) => (
            Some(strip_side(&header[..index], "a/")),
            Some(strip_side(&header[index + 1..], "b/")),
        ),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_file_counts_lines() {
        let diff = "\
diff --git a/a.ts b/a.ts
index 1111111..2222222 100644
--- a/a.ts
+++ b/a.ts
@@ -1,3 +1,5 @@
 keep
-old
+new one
+new two
+new three
 keep
";
        let files = parse_file_summaries(diff);
        assert_eq!(
            files,
            vec![FileSummary {
                path: "a.ts".to_string(),
                old_path: None,
                status: FileStatus::Modified,
                additions: 3,
                deletions: 1,
            }]
        );
    }

    #[test]
    fn added_and_deleted_files() {
        let diff = "\
diff --git a/new.rs b/new.rs
new file mode 100644
index 0000000..e69de29
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,2 @@
+fn main() {}
+
diff --git a/gone.rs b/gone.rs
deleted file mode 100644
index e69de29..0000000
--- a/gone.rs
+++ /dev/null
@@ -1 +0,0 @@
-bye
";
        let files = parse_file_summaries(diff);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "new.rs");
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!(files[0].old_path, None);
        assert_eq!((files[0].additions, files[0].deletions), (2, 0));
        assert_eq!(files[1].path, "gone.rs");
        assert_eq!(files[1].status, FileStatus::Deleted);
        assert_eq!((files[1].additions, files[1].deletions), (0, 1));
    }

    #[test]
    fn pure_rename_has_no_hunks() {
        let diff = "\
diff --git a/old name.txt b/new name.txt
similarity index 100%
rename from old name.txt
rename to new name.txt
";
        let files = parse_file_summaries(diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "new name.txt");
        assert_eq!(files[0].old_path.as_deref(), Some("old name.txt"));
        assert_eq!(files[0].status, FileStatus::Renamed);
    }

    #[test]
    fn hunk_lines_that_look_like_headers_are_content() {
        let diff = "\
diff --git a/notes.md b/notes.md
--- a/notes.md
+++ b/notes.md
@@ -1,2 +1,2 @@
--- a heading rule
+++ a plus rule
";
        let files = parse_file_summaries(diff);
        assert_eq!(files[0].path, "notes.md");
        assert_eq!((files[0].additions, files[0].deletions), (1, 1));
    }

    #[test]
    fn binary_file_uses_header_paths() {
        let diff = "\
diff --git a/logo.png b/logo.png
index 1111111..2222222 100644
Binary files a/logo.png and b/logo.png differ
";
        let files = parse_file_summaries(diff);
        assert_eq!(files[0].path, "logo.png");
        assert_eq!(files[0].status, FileStatus::Modified);
        assert_eq!((files[0].additions, files[0].deletions), (0, 0));
    }

    #[test]
    fn header_split_handles_embedded_separator() {
        assert_eq!(
            split_git_header("a/x b/y.txt b/x b/y.txt"),
            (Some("x b/y.txt".to_string()), Some("x b/y.txt".to_string()))
        );
    }

    #[test]
    fn quoted_paths_are_decoded() {
        let diff = "\
diff --git \"a/caf\\303\\251.ts\" \"b/caf\\303\\251.ts\"
index 1111111..2222222 100644
--- \"a/caf\\303\\251.ts\"
+++ \"b/caf\\303\\251.ts\"
@@ -1 +1 @@
-a
+b
";
        let files = parse_file_summaries(diff);
        assert_eq!(files[0].path, "caf\u{e9}.ts");
        assert_eq!((files[0].additions, files[0].deletions), (1, 1));

        assert_eq!(unquote(r#""tab\there \"q\"""#), "tab\there \"q\"");
        assert_eq!(unquote("plain.ts"), "plain.ts");
    }

    #[test]
    fn empty_diff_has_no_files() {
        assert!(parse_file_summaries("").is_empty());
    }
}
