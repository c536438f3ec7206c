//! Fake transfer tools written as `sh` scripts.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable script named `name` into `dir`.
///
/// # Errors
///
/// Returns an error when the script cannot be written or made executable.
pub fn write_script(dir: &Path, name: &str, body: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}"))?;
    let mut permissions = fs::metadata(&path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions)?;
    Ok(path)
}

const FAKE_RSYNC: &str = r#"
src=""
dst=""
remove=0
for arg in "$@"; do
  if [ "$arg" = "--remove-source-files" ]; then remove=1; fi
  src="$dst"
  dst="$arg"
done
size=$(wc -c < "$src" | tr -d ' ')
mkdir -p "$(dirname "$dst")"
printf '              0   0%%    0.00kB/s    0:00:00\r'
printf '     %s  50%%    1.00MB/s    0:00:01\r' $((size / 2))
cp "$src" "$dst" || exit 11
printf '     %s 100%%    1.00MB/s    0:00:01 (xfr#1, to-chk=0/1)\n' "$size"
echo 'symlink has no referent: "/nowhere"' >&2
echo ""
echo "sent $size bytes  received 35 bytes  100.00 bytes/sec"
echo "total size is $size  speedup is 1.00"
if [ "$remove" = 1 ]; then rm -f "$src"; fi
"#;

/// Synchronization tool stand-in: copies its last-but-one argument to its last one,
/// printing `progress2`-style lines and the closing summary.
///
/// # Errors
///
/// Returns an error when the script cannot be written.
pub fn fake_rsync(dir: &Path) -> io::Result<PathBuf> {
    write_script(dir, "rsync", FAKE_RSYNC)
}

/// Tool that prints `message` to stderr and exits with `code`.
///
/// # Errors
///
/// Returns an error when the script cannot be written.
pub fn failing_tool(dir: &Path, code: i32, message: &str) -> io::Result<PathBuf> {
    let body = format!("echo '  10  1%'\necho '{message}' >&2\nexit {code}\n");
    write_script(dir, "failing-tool", &body)
}

/// Tool that forks a long-lived helper inside its process group, writes its own pid
/// and then the helper's pid (one per line) to `pid_file`, reports some progress and
/// then blocks.
///
/// # Errors
///
/// Returns an error when the script cannot be written.
pub fn hanging_tool(dir: &Path, pid_file: &Path) -> io::Result<PathBuf> {
    let body = format!(
        "sleep 600 &\necho $$ > '{path}'\necho $! >> '{path}'\nprintf '   1,000   5%%\\n'\nwait\n",
        path = pid_file.display()
    );
    write_script(dir, "hanging-tool", &body)
}

/// Tool that leaves a helper holding its output open, writes the helper's pid to
/// `pid_file`, prints a complete sync summary for `size` bytes and exits 0.
///
/// # Errors
///
/// Returns an error when the script cannot be written.
pub fn lingering_helper_tool(dir: &Path, pid_file: &Path, size: u64) -> io::Result<PathBuf> {
    let body = format!(
        "sleep 30 &\necho $! > '{path}'\n\
         echo \"sent {size} bytes  received 35 bytes  100.00 bytes/sec\"\n\
         echo \"total size is {size}  speedup is 1.00\"\nexit 0\n",
        path = pid_file.display()
    );
    write_script(dir, "lingering-tool", &body)
}

/// Cloud tool stand-in. Remote paths `name:path` map to `<remote_root>/<name>/<path>`.
/// Supports `lsjson`, `copyto` and `moveto`.
///
/// # Errors
///
/// Returns an error when the script cannot be written.
pub fn fake_cloud_tool(dir: &Path, remote_root: &Path) -> io::Result<PathBuf> {
    let body = format!(
        r#"
root='{root}'
map() {{
  case "$1" in
    /*) echo "$1" ;;
    *:*) echo "$root/${{1%%:*}}/${{1#*:}}" ;;
    *) echo "$1" ;;
  esac
}}
verb="$1"
if [ "$verb" = "lsjson" ]; then echo "[]"; exit 0; fi
src=$(map "$2")
dst=$(map "$3")
[ -f "$src" ] || {{ echo "ERROR : $2: object not found" >&2; exit 3; }}
size=$(wc -c < "$src" | tr -d ' ')
mkdir -p "$(dirname "$dst")"
echo "INFO  : $((size / 2)) B / $size B, 50%, 1 B/s, ETA 1s" >&2
cp "$src" "$dst" || exit 5
echo "INFO  : $size B / $size B, 100%, 1 B/s, ETA 0s" >&2
if [ "$verb" = "moveto" ]; then rm -f "$src"; fi
"#,
        root = remote_root.display()
    );
    write_script(dir, "cloud-tool", &body)
}
