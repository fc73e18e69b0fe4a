//! Case fixes for mod files and installation of mod signing keys.
//!
//! Workshop content is authored on case-insensitive filesystems, so mods
//! often ship `Addons/` or `Keys/` directories and mixed case `*.pbo` names
//! that the server looks up in lower case.

use log::{debug, info, warn};
use shared::ServerConfig;
use std::fs;
use std::io;
use std::path::Path;

use crate::installation::{installed_mods, InstalledMod};

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = link.parent().map(|dir| dir.join(target));

    if resolved.is_some_and(|path| path.is_dir()) {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

/// Creates a sibling symlink named in lower case that points at `path`.
///
/// Returns whether a link was created. Nothing happens if the name already is
/// lower case or the lower case name exists.
pub fn link_to_lowercase(path: &Path) -> io::Result<bool> {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return Ok(false);
    };

    let lower = name.to_lowercase();
    if lower == name {
        return Ok(false);
    }

    let link = path.with_file_name(&lower);
    if link.symlink_metadata().is_ok() {
        return Ok(false);
    }

    symlink(Path::new(name), &link)?;
    debug!("Linked {} -> {}", link.display(), name);
    Ok(true)
}

/// Links the mod's `Addons`, `Keys` and `*.pbo` names to lower case.
///
/// Returns the number of links created; running it again creates none.
pub fn fix_paths(installed: &InstalledMod) -> io::Result<usize> {
    let mut created = 0;

    for dir in ["Addons", "Keys"] {
        let path = installed.path().join(dir);
        if path.is_dir() && link_to_lowercase(&path)? {
            created += 1;
        }
    }

    for pbo in installed.pbos()? {
        if link_to_lowercase(&pbo)? {
            created += 1;
        }
    }

    Ok(created)
}

/// Fixes the paths of every installed mod. Returns the number of links created.
pub fn fix_all_paths(server: &ServerConfig) -> io::Result<usize> {
    let mut created = 0;

    for installed in installed_mods(server)? {
        debug!("Fixing paths of {}", installed.workshop_mod);
        created += fix_paths(&installed)?;
    }

    Ok(created)
}

/// Copies every installed mod's `*.bikey` files into `<base_dir>/keys`.
///
/// Existing keys are kept unless `overwrite` is set. Returns the number of
/// keys written.
pub fn install_keys(server: &ServerConfig, overwrite: bool) -> io::Result<usize> {
    let keys_dir = server.keys_dir();
    fs::create_dir_all(&keys_dir)?;

    let mut installed_count = 0;

    for installed in installed_mods(server)? {
        for key in installed.bikeys()? {
            let Some(name) = key.file_name() else {
                continue;
            };

            let target = keys_dir.join(name);
            if target.exists() {
                if !overwrite {
                    debug!("Key {:?} already installed", name);
                    continue;
                }
                warn!("Overwriting installed key {:?}", name);
            }

            fs::copy(&key, &target)?;
            info!("Installed key {:?} from {}", name, installed.workshop_mod);
            installed_count += 1;
        }
    }

    Ok(installed_count)
}
