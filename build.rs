use std::{fs, path::Path, process::Command, time::SystemTime};

fn main() {
  let now = SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or_default();
  println!("cargo:rustc-env=BUILD_TIME={}", now);

  // Tell Cargo to rerun this script if git state changes
  println!("cargo:rerun-if-changed=.git/HEAD");
  if Path::new(".git/refs/heads").exists() {
    println!("cargo:rerun-if-changed=.git/refs/heads");
  }

  let git_info = get_git_info();

  let short: String = git_info.commit.chars().take(7).collect();
  println!("cargo:rustc-env=GIT_BRANCH={}", git_info.branch);
  println!("cargo:rustc-env=GIT_COMMIT_SHORT={}", short);
}

struct GitInfo {
  branch: String,
  commit: String,
}

fn git(args: &[&str]) -> Option<String> {
  let output = Command::new("git").args(args).output().ok()?;
  if !output.status.success() {
    return None;
  }
  Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn get_git_info() -> GitInfo {
  let mut info = GitInfo {
    branch: git(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_else(|| "unknown".to_string()),
    commit: git(&["rev-parse", "HEAD"]).unwrap_or_else(|| "unknown".to_string()),
  };

  // Fallback to manual parsing if git is not installed
  if info.commit == "unknown" || info.branch == "unknown" {
    if let Ok(head) = fs::read_to_string(".git/HEAD") {
      if let Some(ref_path) = head.strip_prefix("ref: ") {
        let ref_path = ref_path.trim();
        info.branch = ref_path.rsplit('/').next().unwrap_or("unknown").to_string();

        if let Ok(commit) = fs::read_to_string(format!(".git/{}", ref_path)) {
          info.commit = commit.trim().to_string();
        }
      } else {
        info.commit = head.trim().to_string();
      }
    }
  }

  info
}
