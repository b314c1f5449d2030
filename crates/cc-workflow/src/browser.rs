use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, url: &str);
}

/// Opens the review in a chromeless app window when a Chromium-family browser
/// is installed, otherwise in the default browser. Never fails the review.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

struct AppCandidate {
    name: &'static str,
    program: &'static str,
    args: fn(&'static str, &str) -> Vec<String>,
    installed: fn(&'static str) -> bool,
}

const LINUX_APPS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
];

const MACOS_APPS: &[&str] = &["Google Chrome", "Microsoft Edge", "Chromium"];

fn candidates() -> Vec<AppCandidate> {
    if cfg!(target_os = "macos") {
        MACOS_APPS
            .iter()
            .map(|&name| AppCandidate {
                name,
                program: "open",
                args: |name, url| {
                    vec![
                        "-na".to_string(),
                        name.to_string(),
                        "--args".to_string(),
                        format!("--app={url}"),
                    ]
                },
                installed: |name| Path::new("/Applications").join(format!("{name}.app")).exists(),
            })
            .collect()
    } else if cfg!(target_os = "linux") {
        LINUX_APPS
            .iter()
            .map(|&name| AppCandidate {
                name,
                program: name,
                args: |_, url| vec![format!("--app={url}")],
                installed: |name| which::which(name).is_ok(),
            })
            .collect()
    } else {
        Vec::new()
    }
}

impl BrowserLauncher for SystemBrowser {
    fn launch(&self, url: &str) {
        for candidate in candidates() {
            if !(candidate.installed)(candidate.name) {
                continue;
            }
            let spawned = Command::new(candidate.program)
                .args((candidate.args)(candidate.name, url))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();
            match spawned {
                Ok(mut child) => {
                    debug!(browser = candidate.name, "opened review in app mode");
                    std::thread::spawn(move || {
                        let _ = child.wait();
                    });
                    return;
                }
                Err(err) => debug!(browser = candidate.name, error = %err, "app mode launch failed"),
            }
        }
        if let Err(err) = open::that_detached(url) {
            warn!(url, error = %err, "failed to open browser");
        }
    }
}
