use cc_core::Settings;
use std::path::{Path, PathBuf};

const INDEX: &str = "index.html";

/// Finds the reviewer UI bundle: the configured root first, then the install
/// layouts next to the executable, then a source checkout.
pub fn locate_web_root(settings: &Settings) -> Option<PathBuf> {
    if let Some(root) = &settings.web_root {
        return has_index(root).then(|| root.clone());
    }
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    candidates(exe_dir.as_deref())
        .into_iter()
        .find(|dir| has_index(dir))
}

fn candidates(exe_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(exe_dir) = exe_dir {
        dirs.push(exe_dir.join("web-dist"));
        dirs.push(exe_dir.join("..").join("share").join("codechat").join("web"));
    }
    dirs.push(PathBuf::from("packages").join("web").join("dist"));
    dirs
}

fn has_index(dir: &Path) -> bool {
    dir.join(INDEX).is_file()
}
