//! Terminal listing of mods.

use shared::{Mod, ModMetadata};

use crate::installation::InstalledMod;

pub fn bold(text: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", text)
}

pub fn italic(text: &str) -> String {
    format!("\x1b[3m{}\x1b[0m", text)
}

/// OSC 8 hyperlink, rendered as `text` by terminals that support it.
pub fn link(url: &str, text: &str) -> String {
    format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
}

/// A mod linked to its workshop page, in italics if disabled.
pub fn format_mod(workshop_mod: &Mod) -> String {
    let line = link(&workshop_mod.url(), &workshop_mod.to_string());

    if workshop_mod.enabled {
        line
    } else {
        italic(&line)
    }
}

/// An installed mod, named after its `meta.cpp` unless configured with a name.
pub fn format_installed(installed: &InstalledMod, metadata: Option<&ModMetadata>) -> String {
    let mut workshop_mod = installed.workshop_mod.clone();

    if workshop_mod.name.is_none() {
        workshop_mod.name = metadata.map(|meta| meta.name.clone());
    }

    format_mod(&workshop_mod)
}

/// Header line followed by one line per mod. Empty if there are no mods.
pub fn render<I>(header: &str, lines: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let lines: Vec<String> = lines.into_iter().collect();
    if lines.is_empty() {
        return lines;
    }

    std::iter::once(bold(header)).chain(lines).collect()
}

pub fn print_mods<'a>(header: &str, mods: impl IntoIterator<Item = &'a Mod>) {
    for line in render(header, mods.into_iter().map(format_mod)) {
        println!("{}", line);
    }
}
