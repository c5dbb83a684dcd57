//! Host font discovery for the standard families.
//!
//! Helvetica, Times and Courier are measured from AFM tables, but those
//! tables have no outlines to paint. Each standard slot is therefore backed
//! by an installed face of the same design class, preferring the
//! metric-compatible Liberation and Croscore families. The scan runs once
//! per process.
//!
//! `LAMINA_FONT_DIRS` adds directories (`:`-separated, `;` on Windows) ahead
//! of the platform ones. `LAMINA_NO_SYSTEM_FONTS` disables the scan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use ttf_parser::Face;

use super::{CustomFontMetrics, FontData, FontKey};

const SANS: &[&str] = &[
    "liberation sans",
    "arimo",
    "helvetica",
    "arial",
    "nimbus sans",
    "nimbus sans l",
    "dejavu sans",
    "freesans",
    "noto sans",
];

const SERIF: &[&str] = &[
    "liberation serif",
    "tinos",
    "times new roman",
    "times",
    "nimbus roman",
    "nimbus roman no9 l",
    "dejavu serif",
    "freeserif",
    "noto serif",
];

const MONO: &[&str] = &[
    "liberation mono",
    "cousine",
    "courier new",
    "courier",
    "nimbus mono ps",
    "nimbus mono l",
    "dejavu sans mono",
    "freemono",
    "noto sans mono",
];

/// (lowercase family, bold, italic) -> file
type FontIndex = HashMap<(String, bool, bool), PathBuf>;

static SUBSTITUTES: OnceLock<Vec<(FontKey, FontData)>> = OnceLock::new();

/// Outline faces for the standard slots, keyed the way the registry keys
/// the standard fonts. Empty when the host has none of the candidates.
pub fn substitutes() -> &'static [(FontKey, FontData)] {
    SUBSTITUTES.get_or_init(|| {
        if std::env::var_os("LAMINA_NO_SYSTEM_FONTS").is_some() {
            return Vec::new();
        }
        let index = scan_font_dirs(&font_directories());
        let found = pick_substitutes(&index);
        if found.is_empty() {
            log::warn!("No system faces for Helvetica, Times or Courier; their text will be greeked");
        }
        found
    })
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var("LAMINA_FONT_DIRS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        dirs.extend(
            val.split(sep)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(PathBuf::from),
        );
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".local/share/fonts"));
            dirs.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        match std::env::var("WINDIR") {
            Ok(windir) => dirs.push(PathBuf::from(windir).join("Fonts")),
            Err(_) => dirs.push("C:\\Windows\\Fonts".into()),
        }
    }

    dirs
}

/// Walk `dirs` and index every upright-width regular or bold face. The
/// first file found for a key wins; directory listings are sorted so the
/// winner does not depend on readdir order.
fn scan_font_dirs(dirs: &[PathBuf]) -> FontIndex {
    let t0 = std::time::Instant::now();
    let mut index = FontIndex::new();
    let mut files_scanned = 0u32;
    let mut visited = std::collections::HashSet::new();

    // Reversed so the first configured directory is scanned first.
    let mut stack: Vec<PathBuf> = dirs.iter().rev().cloned().collect();
    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();

        let mut subdirs = Vec::new();
        for path in paths {
            if path.is_dir() {
                subdirs.push(path);
            } else if is_font_file(&path) {
                files_scanned += 1;
                let Ok(data) = std::fs::read(&path) else {
                    continue;
                };
                if let Some((family, bold, italic)) = read_font_style(&data) {
                    index.entry((family, bold, italic)).or_insert(path);
                }
            }
        }
        stack.extend(subdirs.into_iter().rev());
    }

    log::debug!(
        "Font scan: {:.1}ms, {} files parsed, {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        files_scanned,
        index.len(),
    );
    index
}

/// Collections are skipped: the registry always parses face 0.
fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf")
    )
}

/// Family name (name ID 1), bold and italic. Light, black and condensed
/// cuts return `None` so they never stand in for a regular face.
fn read_font_style(data: &[u8]) -> Option<(String, bool, bool)> {
    let face = Face::parse(data, 0).ok()?;
    if face.width() != ttf_parser::Width::Normal {
        return None;
    }
    let bold = match face.weight().to_number() {
        350..=500 => false,
        600..=800 => true,
        _ => return None,
    };
    let family = face
        .names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode())
        .find_map(|name| name.to_string())?;
    Some((family.to_lowercase(), bold, face.is_italic() || face.is_oblique()))
}

fn pick_substitutes(index: &FontIndex) -> Vec<(FontKey, FontData)> {
    let mut loaded: HashMap<PathBuf, Option<FontData>> = HashMap::new();
    let mut out = Vec::new();

    for (family, candidates) in [("Helvetica", SANS), ("Times", SERIF), ("Courier", MONO)] {
        for (weight, italic) in [(400, false), (700, false), (400, true), (700, true)] {
            let bold = weight == 700;
            let exact = candidates
                .iter()
                .find_map(|c| index.get(&(c.to_string(), bold, italic)));
            // A missing cut borrows the regular face rather than greeking.
            let Some(path) = exact.or_else(|| {
                candidates
                    .iter()
                    .find_map(|c| index.get(&(c.to_string(), false, false)))
            }) else {
                continue;
            };
            let data = loaded
                .entry(path.clone())
                .or_insert_with(|| load_face(path))
                .clone();
            if let Some(data) = data {
                log::debug!(
                    "{} {} {} backed by {}",
                    family,
                    weight,
                    if italic { "italic" } else { "upright" },
                    path.display()
                );
                out.push((
                    FontKey {
                        family: family.to_string(),
                        weight,
                        italic,
                    },
                    data,
                ));
            }
        }
    }
    out
}

fn load_face(path: &Path) -> Option<FontData> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    let metrics = CustomFontMetrics::from_font_data(&data)?;
    Some(FontData::Custom {
        data: Arc::from(data),
        metrics: Arc::new(metrics),
    })
}
