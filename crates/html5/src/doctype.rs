//! Doctype-driven document mode classification.
//!
//! A pure lookup over the legacy DOCTYPE identifier tables: exact matches and
//! prefix matches, all ASCII case-insensitive.

use crate::sink::DocumentMode;
use crate::token::DoctypeToken;

static QUIRKS_PUBLIC_ID_PREFIXES: &[&str] = &[
    "+//silmaril//dtd html pro v0r11 19970101//",
    "-//as//dtd html 3.0 aswedit + extensions//",
    "-//advasoft ltd//dtd html 3.0 aswedit + extensions//",
    "-//ietf//dtd html 2.0 level 1//",
    "-//ietf//dtd html 2.0 level 2//",
    "-//ietf//dtd html 2.0 strict level 1//",
    "-//ietf//dtd html 2.0 strict level 2//",
    "-//ietf//dtd html 2.0 strict//",
    "-//ietf//dtd html 2.0//",
    "-//ietf//dtd html 2.1e//",
    "-//ietf//dtd html 3.0//",
    "-//ietf//dtd html 3.2 final//",
    "-//ietf//dtd html 3.2//",
    "-//ietf//dtd html 3//",
    "-//ietf//dtd html level 0//",
    "-//ietf//dtd html level 1//",
    "-//ietf//dtd html level 2//",
    "-//ietf//dtd html level 3//",
    "-//ietf//dtd html strict level 0//",
    "-//ietf//dtd html strict level 1//",
    "-//ietf//dtd html strict level 2//",
    "-//ietf//dtd html strict level 3//",
    "-//ietf//dtd html strict//",
    "-//ietf//dtd html//",
    "-//metrius//dtd metrius presentational//",
    "-//microsoft//dtd internet explorer 2.0 html strict//",
    "-//microsoft//dtd internet explorer 2.0 html//",
    "-//microsoft//dtd internet explorer 2.0 tables//",
    "-//microsoft//dtd internet explorer 3.0 html strict//",
    "-//microsoft//dtd internet explorer 3.0 html//",
    "-//microsoft//dtd internet explorer 3.0 tables//",
    "-//netscape comm. corp.//dtd html//",
    "-//netscape comm. corp.//dtd strict html//",
    "-//o'reilly and associates//dtd html 2.0//",
    "-//o'reilly and associates//dtd html extended 1.0//",
    "-//o'reilly and associates//dtd html extended relaxed 1.0//",
    "-//sq//dtd html 2.0 hotmetal + extensions//",
    "-//softquad software//dtd hotmetal pro 6.0::19990601::extensions to html 4.0//",
    "-//softquad//dtd hotmetal pro 4.0::19971010::extensions to html 4.0//",
    "-//spyglass//dtd html 2.0 extended//",
    "-//sun microsystems corp.//dtd hotjava html//",
    "-//sun microsystems corp.//dtd hotjava strict html//",
    "-//w3c//dtd html 3 1995-03-24//",
    "-//w3c//dtd html 3.2 draft//",
    "-//w3c//dtd html 3.2 final//",
    "-//w3c//dtd html 3.2//",
    "-//w3c//dtd html 3.2s draft//",
    "-//w3c//dtd html 4.0 frameset//",
    "-//w3c//dtd html 4.0 transitional//",
    "-//w3c//dtd html experimental 19960712//",
    "-//w3c//dtd html experimental 970421//",
    "-//w3c//dtd w3 html//",
    "-//w3o//dtd w3 html 3.0//",
    "-//webtechs//dtd mozilla html 2.0//",
    "-//webtechs//dtd mozilla html//",
];

static QUIRKS_PUBLIC_IDS: &[&str] = &[
    "-//w3o//dtd w3 html strict 3.0//en//",
    "-/w3c/dtd html 4.0 transitional/en",
    "html",
];

static QUIRKS_SYSTEM_IDS: &[&str] = &["http://www.ibm.com/data/dtd/v11/ibmxhtml1-transitional.dtd"];

/// Prefixes that are quirks without a system id and limited-quirks with one.
static HTML401_PUBLIC_ID_PREFIXES: &[&str] = &[
    "-//w3c//dtd html 4.01 frameset//",
    "-//w3c//dtd html 4.01 transitional//",
];

static LIMITED_QUIRKS_PUBLIC_ID_PREFIXES: &[&str] = &[
    "-//w3c//dtd xhtml 1.0 frameset//",
    "-//w3c//dtd xhtml 1.0 transitional//",
];

fn has_prefix_in(haystack: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| {
        haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
    })
}

/// Classify a doctype token into a document compatibility mode per the legacy
/// identifier tables.
pub fn document_mode(doctype: &DoctypeToken) -> DocumentMode {
    if doctype.force_quirks || doctype.name.as_deref() != Some("html") {
        return DocumentMode::Quirks;
    }
    let public_id = doctype.public_id.as_deref().unwrap_or("").to_ascii_lowercase();
    let system_id = doctype.system_id.as_deref().unwrap_or("").to_ascii_lowercase();

    if doctype.public_id.is_some() {
        if QUIRKS_PUBLIC_IDS.contains(&public_id.as_str())
            || has_prefix_in(&public_id, QUIRKS_PUBLIC_ID_PREFIXES)
        {
            return DocumentMode::Quirks;
        }
        if has_prefix_in(&public_id, HTML401_PUBLIC_ID_PREFIXES) {
            return if doctype.system_id.is_some() {
                DocumentMode::LimitedQuirks
            } else {
                DocumentMode::Quirks
            };
        }
        if has_prefix_in(&public_id, LIMITED_QUIRKS_PUBLIC_ID_PREFIXES) {
            return DocumentMode::LimitedQuirks;
        }
    }
    if doctype.system_id.is_some() && QUIRKS_SYSTEM_IDS.contains(&system_id.as_str()) {
        return DocumentMode::Quirks;
    }
    DocumentMode::NoQuirks
}

#[cfg(test)]
mod tests {
    use super::document_mode;
    use crate::sink::DocumentMode;
    use crate::token::DoctypeToken;

    fn doctype(
        name: Option<&str>,
        public_id: Option<&str>,
        system_id: Option<&str>,
        force_quirks: bool,
    ) -> DoctypeToken {
        DoctypeToken {
            name: name.map(str::to_string),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
            force_quirks,
        }
    }

    #[test]
    fn modern_doctype_is_no_quirks() {
        assert_eq!(
            document_mode(&doctype(Some("html"), None, None, false)),
            DocumentMode::NoQuirks
        );
    }

    #[test]
    fn force_quirks_and_missing_name_are_quirks() {
        assert_eq!(
            document_mode(&doctype(Some("html"), None, None, true)),
            DocumentMode::Quirks
        );
        assert_eq!(
            document_mode(&doctype(None, None, None, false)),
            DocumentMode::Quirks
        );
        assert_eq!(
            document_mode(&doctype(Some("svg"), None, None, false)),
            DocumentMode::Quirks
        );
    }

    #[test]
    fn legacy_public_ids_match_case_insensitively() {
        assert_eq!(
            document_mode(&doctype(
                Some("html"),
                Some("-//W3C//DTD HTML 3.2 Final//EN"),
                None,
                false
            )),
            DocumentMode::Quirks
        );
        assert_eq!(
            document_mode(&doctype(Some("html"), Some("HTML"), None, false)),
            DocumentMode::Quirks
        );
        assert_eq!(
            document_mode(&doctype(Some("html"), Some("hTmL"), None, false)),
            DocumentMode::Quirks
        );
    }

    #[test]
    fn html401_prefixes_depend_on_system_id_presence() {
        let public = "-//W3C//DTD HTML 4.01 Transitional//EN";
        assert_eq!(
            document_mode(&doctype(Some("html"), Some(public), None, false)),
            DocumentMode::Quirks
        );
        assert_eq!(
            document_mode(&doctype(
                Some("html"),
                Some(public),
                Some("http://www.w3.org/TR/html4/loose.dtd"),
                false
            )),
            DocumentMode::LimitedQuirks
        );
    }

    #[test]
    fn xhtml_transitional_is_limited_quirks() {
        assert_eq!(
            document_mode(&doctype(
                Some("html"),
                Some("-//W3C//DTD XHTML 1.0 Transitional//EN"),
                Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd"),
                false
            )),
            DocumentMode::LimitedQuirks
        );
    }

    #[test]
    fn ibm_system_id_is_quirks() {
        assert_eq!(
            document_mode(&doctype(
                Some("html"),
                None,
                Some("http://www.IBM.com/data/dtd/v11/ibmxhtml1-transitional.dtd"),
                false
            )),
            DocumentMode::Quirks
        );
    }
}
