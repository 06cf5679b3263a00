//! C string literal extraction.

use std::borrow::Cow;

use tracing::warn;

use super::header::MachImage;
use super::segment::Section;

/// Sections holding NUL-separated string literals, in output order.
const STRING_SECTIONS: &[&str] = &["__cstring", "__oslogstring"];

impl<'a> MachImage<'a> {
    /// Collects the strings of every `__cstring` section, then every
    /// `__oslogstring` section.
    ///
    /// Empty strings (alignment padding) are dropped. Invalid UTF-8 is
    /// replaced lossily.
    pub fn cstrings(&self) -> Vec<Cow<'a, str>> {
        let sections: Vec<Section<'a>> = self
            .segments()
            .into_iter()
            .flat_map(|segment| segment.sections)
            .collect();

        let mut strings = Vec::new();
        for wanted in STRING_SECTIONS {
            for section in sections.iter().filter(|s| s.sectname == *wanted) {
                let data = match section.data(self) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("skipping section {}: {}", section.full_name(), e);
                        continue;
                    }
                };
                strings.extend(
                    data.split(|&b| b == 0)
                        .filter(|s| !s.is_empty())
                        .map(String::from_utf8_lossy),
                );
            }
        }
        strings
    }
}
