//! Named and numeric character-reference resolution.
//!
//! The named-entity data is a static lookup resource: a byte-sorted table of
//! `(name, replacement)` pairs, where names keep their terminating `;` when
//! the reference requires one and appear twice when a legacy semicolon-less
//! form exists. Resolution walks the table as a binary-searched prefix tree:
//! each consumed character narrows a sorted range, which is exactly a branch
//! search over the serialized tree. Replacements are one or two code points.
//!
//! Extending coverage is a data-only change; the matcher is agnostic to table
//! size.

use crate::error::ParseErrorCode;

/// Sorted named character references. Subset shipped: every entity with a
/// legacy semicolon-less form, plus the common symbol/Greek/arrow set.
pub(crate) static ENTITIES: &[(&str, &str)] = &[
    ("AElig", "\u{C6}"),
    ("AElig;", "\u{C6}"),
    ("AMP", "&"),
    ("AMP;", "&"),
    ("Aacute", "\u{C1}"),
    ("Aacute;", "\u{C1}"),
    ("Acirc", "\u{C2}"),
    ("Acirc;", "\u{C2}"),
    ("Agrave", "\u{C0}"),
    ("Agrave;", "\u{C0}"),
    ("Alpha;", "\u{391}"),
    ("Aring", "\u{C5}"),
    ("Aring;", "\u{C5}"),
    ("Atilde", "\u{C3}"),
    ("Atilde;", "\u{C3}"),
    ("Auml", "\u{C4}"),
    ("Auml;", "\u{C4}"),
    ("Beta;", "\u{392}"),
    ("COPY", "\u{A9}"),
    ("COPY;", "\u{A9}"),
    ("Ccedil", "\u{C7}"),
    ("Ccedil;", "\u{C7}"),
    ("Chi;", "\u{3A7}"),
    ("Dagger;", "\u{2021}"),
    ("Delta;", "\u{394}"),
    ("ETH", "\u{D0}"),
    ("ETH;", "\u{D0}"),
    ("Eacute", "\u{C9}"),
    ("Eacute;", "\u{C9}"),
    ("Ecirc", "\u{CA}"),
    ("Ecirc;", "\u{CA}"),
    ("Egrave", "\u{C8}"),
    ("Egrave;", "\u{C8}"),
    ("Epsilon;", "\u{395}"),
    ("Eta;", "\u{397}"),
    ("Euml", "\u{CB}"),
    ("Euml;", "\u{CB}"),
    ("GT", ">"),
    ("GT;", ">"),
    ("Gamma;", "\u{393}"),
    ("Iacute", "\u{CD}"),
    ("Iacute;", "\u{CD}"),
    ("Icirc", "\u{CE}"),
    ("Icirc;", "\u{CE}"),
    ("Igrave", "\u{CC}"),
    ("Igrave;", "\u{CC}"),
    ("Iota;", "\u{399}"),
    ("Iuml", "\u{CF}"),
    ("Iuml;", "\u{CF}"),
    ("Kappa;", "\u{39A}"),
    ("LT", "<"),
    ("LT;", "<"),
    ("Lambda;", "\u{39B}"),
    ("Mu;", "\u{39C}"),
    ("NotEqualTilde;", "\u{2242}\u{338}"),
    ("Ntilde", "\u{D1}"),
    ("Ntilde;", "\u{D1}"),
    ("Nu;", "\u{39D}"),
    ("OElig;", "\u{152}"),
    ("Oacute", "\u{D3}"),
    ("Oacute;", "\u{D3}"),
    ("Ocirc", "\u{D4}"),
    ("Ocirc;", "\u{D4}"),
    ("Ograve", "\u{D2}"),
    ("Ograve;", "\u{D2}"),
    ("Omega;", "\u{3A9}"),
    ("Omicron;", "\u{39F}"),
    ("Oslash", "\u{D8}"),
    ("Oslash;", "\u{D8}"),
    ("Otilde", "\u{D5}"),
    ("Otilde;", "\u{D5}"),
    ("Ouml", "\u{D6}"),
    ("Ouml;", "\u{D6}"),
    ("Phi;", "\u{3A6}"),
    ("Pi;", "\u{3A0}"),
    ("Prime;", "\u{2033}"),
    ("Psi;", "\u{3A8}"),
    ("QUOT", "\""),
    ("QUOT;", "\""),
    ("REG", "\u{AE}"),
    ("REG;", "\u{AE}"),
    ("Rho;", "\u{3A1}"),
    ("Scaron;", "\u{160}"),
    ("Sigma;", "\u{3A3}"),
    ("THORN", "\u{DE}"),
    ("THORN;", "\u{DE}"),
    ("Tau;", "\u{3A4}"),
    ("Theta;", "\u{398}"),
    ("Uacute", "\u{DA}"),
    ("Uacute;", "\u{DA}"),
    ("Ucirc", "\u{DB}"),
    ("Ucirc;", "\u{DB}"),
    ("Ugrave", "\u{D9}"),
    ("Ugrave;", "\u{D9}"),
    ("Upsilon;", "\u{3A5}"),
    ("Uuml", "\u{DC}"),
    ("Uuml;", "\u{DC}"),
    ("Xi;", "\u{39E}"),
    ("Yacute", "\u{DD}"),
    ("Yacute;", "\u{DD}"),
    ("Yuml;", "\u{178}"),
    ("Zeta;", "\u{396}"),
    ("aacute", "\u{E1}"),
    ("aacute;", "\u{E1}"),
    ("acirc", "\u{E2}"),
    ("acirc;", "\u{E2}"),
    ("acute", "\u{B4}"),
    ("acute;", "\u{B4}"),
    ("aelig", "\u{E6}"),
    ("aelig;", "\u{E6}"),
    ("agrave", "\u{E0}"),
    ("agrave;", "\u{E0}"),
    ("alefsym;", "\u{2135}"),
    ("alpha;", "\u{3B1}"),
    ("amp", "&"),
    ("amp;", "&"),
    ("and;", "\u{2227}"),
    ("ang;", "\u{2220}"),
    ("apos;", "'"),
    ("aring", "\u{E5}"),
    ("aring;", "\u{E5}"),
    ("asymp;", "\u{2248}"),
    ("atilde", "\u{E3}"),
    ("atilde;", "\u{E3}"),
    ("auml", "\u{E4}"),
    ("auml;", "\u{E4}"),
    ("bdquo;", "\u{201E}"),
    ("beta;", "\u{3B2}"),
    ("brvbar", "\u{A6}"),
    ("brvbar;", "\u{A6}"),
    ("bull;", "\u{2022}"),
    ("cap;", "\u{2229}"),
    ("ccedil", "\u{E7}"),
    ("ccedil;", "\u{E7}"),
    ("cedil", "\u{B8}"),
    ("cedil;", "\u{B8}"),
    ("cent", "\u{A2}"),
    ("cent;", "\u{A2}"),
    ("chi;", "\u{3C7}"),
    ("circ;", "\u{2C6}"),
    ("clubs;", "\u{2663}"),
    ("cong;", "\u{2245}"),
    ("copy", "\u{A9}"),
    ("copy;", "\u{A9}"),
    ("crarr;", "\u{21B5}"),
    ("cup;", "\u{222A}"),
    ("curren", "\u{A4}"),
    ("curren;", "\u{A4}"),
    ("dArr;", "\u{21D3}"),
    ("dagger;", "\u{2020}"),
    ("darr;", "\u{2193}"),
    ("deg", "\u{B0}"),
    ("deg;", "\u{B0}"),
    ("delta;", "\u{3B4}"),
    ("diams;", "\u{2666}"),
    ("divide", "\u{F7}"),
    ("divide;", "\u{F7}"),
    ("eacute", "\u{E9}"),
    ("eacute;", "\u{E9}"),
    ("ecirc", "\u{EA}"),
    ("ecirc;", "\u{EA}"),
    ("egrave", "\u{E8}"),
    ("egrave;", "\u{E8}"),
    ("empty;", "\u{2205}"),
    ("emsp;", "\u{2003}"),
    ("ensp;", "\u{2002}"),
    ("epsilon;", "\u{3B5}"),
    ("equiv;", "\u{2261}"),
    ("eta;", "\u{3B7}"),
    ("eth", "\u{F0}"),
    ("eth;", "\u{F0}"),
    ("euml", "\u{EB}"),
    ("euml;", "\u{EB}"),
    ("euro;", "\u{20AC}"),
    ("exist;", "\u{2203}"),
    ("fjlig;", "fj"),
    ("fnof;", "\u{192}"),
    ("forall;", "\u{2200}"),
    ("frac12", "\u{BD}"),
    ("frac12;", "\u{BD}"),
    ("frac14", "\u{BC}"),
    ("frac14;", "\u{BC}"),
    ("frac34", "\u{BE}"),
    ("frac34;", "\u{BE}"),
    ("frasl;", "\u{2044}"),
    ("gamma;", "\u{3B3}"),
    ("ge;", "\u{2265}"),
    ("gt", ">"),
    ("gt;", ">"),
    ("hArr;", "\u{21D4}"),
    ("harr;", "\u{2194}"),
    ("hearts;", "\u{2665}"),
    ("hellip;", "\u{2026}"),
    ("iacute", "\u{ED}"),
    ("iacute;", "\u{ED}"),
    ("icirc", "\u{EE}"),
    ("icirc;", "\u{EE}"),
    ("iexcl", "\u{A1}"),
    ("iexcl;", "\u{A1}"),
    ("igrave", "\u{EC}"),
    ("igrave;", "\u{EC}"),
    ("image;", "\u{2111}"),
    ("infin;", "\u{221E}"),
    ("int;", "\u{222B}"),
    ("iota;", "\u{3B9}"),
    ("iquest", "\u{BF}"),
    ("iquest;", "\u{BF}"),
    ("isin;", "\u{2208}"),
    ("iuml", "\u{EF}"),
    ("iuml;", "\u{EF}"),
    ("kappa;", "\u{3BA}"),
    ("lArr;", "\u{21D0}"),
    ("lambda;", "\u{3BB}"),
    ("lang;", "\u{27E8}"),
    ("laquo", "\u{AB}"),
    ("laquo;", "\u{AB}"),
    ("larr;", "\u{2190}"),
    ("lceil;", "\u{2308}"),
    ("ldquo;", "\u{201C}"),
    ("le;", "\u{2264}"),
    ("lfloor;", "\u{230A}"),
    ("lowast;", "\u{2217}"),
    ("loz;", "\u{25CA}"),
    ("lrm;", "\u{200E}"),
    ("lsaquo;", "\u{2039}"),
    ("lsquo;", "\u{2018}"),
    ("lt", "<"),
    ("lt;", "<"),
    ("macr", "\u{AF}"),
    ("macr;", "\u{AF}"),
    ("mdash;", "\u{2014}"),
    ("micro", "\u{B5}"),
    ("micro;", "\u{B5}"),
    ("middot", "\u{B7}"),
    ("middot;", "\u{B7}"),
    ("minus;", "\u{2212}"),
    ("mu;", "\u{3BC}"),
    ("nabla;", "\u{2207}"),
    ("nbsp", "\u{A0}"),
    ("nbsp;", "\u{A0}"),
    ("ndash;", "\u{2013}"),
    ("ne;", "\u{2260}"),
    ("ni;", "\u{220B}"),
    ("not", "\u{AC}"),
    ("not;", "\u{AC}"),
    ("notin;", "\u{2209}"),
    ("nsub;", "\u{2284}"),
    ("ntilde", "\u{F1}"),
    ("ntilde;", "\u{F1}"),
    ("nu;", "\u{3BD}"),
    ("oacute", "\u{F3}"),
    ("oacute;", "\u{F3}"),
    ("ocirc", "\u{F4}"),
    ("ocirc;", "\u{F4}"),
    ("oelig;", "\u{153}"),
    ("ograve", "\u{F2}"),
    ("ograve;", "\u{F2}"),
    ("oline;", "\u{203E}"),
    ("omega;", "\u{3C9}"),
    ("omicron;", "\u{3BF}"),
    ("oplus;", "\u{2295}"),
    ("or;", "\u{2228}"),
    ("ordf", "\u{AA}"),
    ("ordf;", "\u{AA}"),
    ("ordm", "\u{BA}"),
    ("ordm;", "\u{BA}"),
    ("oslash", "\u{F8}"),
    ("oslash;", "\u{F8}"),
    ("otilde", "\u{F5}"),
    ("otilde;", "\u{F5}"),
    ("otimes;", "\u{2297}"),
    ("ouml", "\u{F6}"),
    ("ouml;", "\u{F6}"),
    ("para", "\u{B6}"),
    ("para;", "\u{B6}"),
    ("part;", "\u{2202}"),
    ("permil;", "\u{2030}"),
    ("perp;", "\u{22A5}"),
    ("phi;", "\u{3C6}"),
    ("pi;", "\u{3C0}"),
    ("piv;", "\u{3D6}"),
    ("plusmn", "\u{B1}"),
    ("plusmn;", "\u{B1}"),
    ("pound", "\u{A3}"),
    ("pound;", "\u{A3}"),
    ("prime;", "\u{2032}"),
    ("prod;", "\u{220F}"),
    ("prop;", "\u{221D}"),
    ("psi;", "\u{3C8}"),
    ("quot", "\""),
    ("quot;", "\""),
    ("rArr;", "\u{21D2}"),
    ("radic;", "\u{221A}"),
    ("rang;", "\u{27E9}"),
    ("raquo", "\u{BB}"),
    ("raquo;", "\u{BB}"),
    ("rarr;", "\u{2192}"),
    ("rceil;", "\u{2309}"),
    ("rdquo;", "\u{201D}"),
    ("real;", "\u{211C}"),
    ("reg", "\u{AE}"),
    ("reg;", "\u{AE}"),
    ("rfloor;", "\u{230B}"),
    ("rho;", "\u{3C1}"),
    ("rlm;", "\u{200F}"),
    ("rsaquo;", "\u{203A}"),
    ("rsquo;", "\u{2019}"),
    ("sbquo;", "\u{201A}"),
    ("scaron;", "\u{161}"),
    ("sdot;", "\u{22C5}"),
    ("sect", "\u{A7}"),
    ("sect;", "\u{A7}"),
    ("shy", "\u{AD}"),
    ("shy;", "\u{AD}"),
    ("sigma;", "\u{3C3}"),
    ("sigmaf;", "\u{3C2}"),
    ("sim;", "\u{223C}"),
    ("spades;", "\u{2660}"),
    ("sub;", "\u{2282}"),
    ("sube;", "\u{2286}"),
    ("sum;", "\u{2211}"),
    ("sup1", "\u{B9}"),
    ("sup1;", "\u{B9}"),
    ("sup2", "\u{B2}"),
    ("sup2;", "\u{B2}"),
    ("sup3", "\u{B3}"),
    ("sup3;", "\u{B3}"),
    ("sup;", "\u{2283}"),
    ("supe;", "\u{2287}"),
    ("szlig", "\u{DF}"),
    ("szlig;", "\u{DF}"),
    ("tau;", "\u{3C4}"),
    ("there4;", "\u{2234}"),
    ("theta;", "\u{3B8}"),
    ("thetasym;", "\u{3D1}"),
    ("thinsp;", "\u{2009}"),
    ("thorn", "\u{FE}"),
    ("thorn;", "\u{FE}"),
    ("tilde;", "\u{2DC}"),
    ("times", "\u{D7}"),
    ("times;", "\u{D7}"),
    ("trade;", "\u{2122}"),
    ("uArr;", "\u{21D1}"),
    ("uacute", "\u{FA}"),
    ("uacute;", "\u{FA}"),
    ("uarr;", "\u{2191}"),
    ("ucirc", "\u{FB}"),
    ("ucirc;", "\u{FB}"),
    ("ugrave", "\u{F9}"),
    ("ugrave;", "\u{F9}"),
    ("uml", "\u{A8}"),
    ("uml;", "\u{A8}"),
    ("upsih;", "\u{3D2}"),
    ("upsilon;", "\u{3C5}"),
    ("uuml", "\u{FC}"),
    ("uuml;", "\u{FC}"),
    ("weierp;", "\u{2118}"),
    ("xi;", "\u{3BE}"),
    ("yacute", "\u{FD}"),
    ("yacute;", "\u{FD}"),
    ("yen", "\u{A5}"),
    ("yen;", "\u{A5}"),
    ("yuml", "\u{FF}"),
    ("yuml;", "\u{FF}"),
    ("zeta;", "\u{3B6}"),
    ("zwj;", "\u{200D}"),
    ("zwnj;", "\u{200C}"),
];

/// Narrow `[lo, hi)` to the entries whose name byte at `depth` equals `b`.
/// All entries in the incoming range share their first `depth` bytes, so the
/// target sub-range is contiguous and both edges binary-search in O(log n).
pub(crate) fn narrow(lo: usize, hi: usize, depth: usize, b: u8) -> (usize, usize) {
    let range = &ENTITIES[lo..hi];
    let start = range.partition_point(|(name, _)| match name.as_bytes().get(depth) {
        Some(&c) => c < b,
        // Shorter names sort before any extension of themselves.
        None => true,
    });
    let end = range.partition_point(|(name, _)| match name.as_bytes().get(depth) {
        Some(&c) => c <= b,
        None => true,
    });
    (lo + start, lo + end)
}

/// Entry in `[lo, hi)` whose name is exactly the `depth` bytes consumed so
/// far. Sorting puts it first in the range when it exists.
pub(crate) fn exact_match(lo: usize, hi: usize, depth: usize) -> Option<usize> {
    (lo < hi && ENTITIES[lo].0.len() == depth).then_some(lo)
}

/// Windows-1252 remappings for numeric references to the C1 control range.
/// Index is `code - 0x80`; zero means the code point is kept as-is.
static C1_REMAP: [u32; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

fn is_noncharacter(code: u32) -> bool {
    matches!(code, 0xFDD0..=0xFDEF) || matches!(code & 0xFFFF, 0xFFFE | 0xFFFF)
}

fn is_control(code: u32) -> bool {
    matches!(code, 0x00..=0x1F | 0x7F..=0x9F)
}

fn is_ascii_whitespace_code(code: u32) -> bool {
    matches!(code, 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// Normalize a numeric character-reference value per the reference-end rules:
/// legacy Windows-1252 remap for C1 controls, U+FFFD for NUL, surrogates, and
/// out-of-range values. Returns the replacement character and the advisory
/// error the value triggered, if any.
pub(crate) fn normalize_numeric_reference(code: u32) -> (char, Option<ParseErrorCode>) {
    if code == 0 {
        return ('\u{FFFD}', Some(ParseErrorCode::NullCharacterReference));
    }
    if code > 0x10FFFF {
        return (
            '\u{FFFD}',
            Some(ParseErrorCode::CharacterReferenceOutsideUnicodeRange),
        );
    }
    if matches!(code, 0xD800..=0xDFFF) {
        return ('\u{FFFD}', Some(ParseErrorCode::SurrogateCharacterReference));
    }
    if is_noncharacter(code) {
        let ch = char::from_u32(code).unwrap_or('\u{FFFD}');
        return (ch, Some(ParseErrorCode::NoncharacterCharacterReference));
    }
    if code == 0x0D || (is_control(code) && !is_ascii_whitespace_code(code)) {
        let remapped = if (0x80..=0x9F).contains(&code) {
            match C1_REMAP[(code - 0x80) as usize] {
                0 => code,
                mapped => mapped,
            }
        } else {
            code
        };
        let ch = char::from_u32(remapped).unwrap_or('\u{FFFD}');
        return (ch, Some(ParseErrorCode::ControlCharacterReference));
    }
    match char::from_u32(code) {
        Some(ch) => (ch, None),
        None => ('\u{FFFD}', Some(ParseErrorCode::SurrogateCharacterReference)),
    }
}

#[cfg(test)]
mod tests {
    use super::{ENTITIES, exact_match, narrow, normalize_numeric_reference};
    use crate::error::ParseErrorCode;

    fn resolve(name: &str) -> Option<&'static str> {
        let (mut lo, mut hi) = (0, ENTITIES.len());
        for (depth, b) in name.bytes().enumerate() {
            let narrowed = narrow(lo, hi, depth, b);
            lo = narrowed.0;
            hi = narrowed.1;
            if lo >= hi {
                return None;
            }
        }
        exact_match(lo, hi, name.len()).map(|idx| ENTITIES[idx].1)
    }

    #[test]
    fn table_is_byte_sorted_and_unique() {
        assert!(
            ENTITIES
                .windows(2)
                .all(|pair| pair[0].0.as_bytes() < pair[1].0.as_bytes()),
            "entity table must be strictly byte-sorted for the prefix walk"
        );
    }

    #[test]
    fn common_references_resolve() {
        assert_eq!(resolve("amp;"), Some("&"));
        assert_eq!(resolve("amp"), Some("&"));
        assert_eq!(resolve("lt;"), Some("<"));
        assert_eq!(resolve("nbsp"), Some("\u{A0}"));
        assert_eq!(resolve("not;"), Some("\u{AC}"));
        assert_eq!(resolve("notin;"), Some("\u{2209}"));
        assert_eq!(resolve("fjlig;"), Some("fj"));
        assert_eq!(resolve("NotEqualTilde;"), Some("\u{2242}\u{338}"));
        assert_eq!(resolve("bogus;"), None);
    }

    #[test]
    fn narrowing_dead_ends_on_unknown_prefixes() {
        let (lo, hi) = narrow(0, ENTITIES.len(), 0, b'q');
        assert!(lo < hi, "q-prefixed entities exist");
        let (lo2, hi2) = narrow(lo, hi, 1, b'z');
        assert_eq!(lo2, hi2, "no entity starts with qz");
    }

    #[test]
    fn numeric_normalization_applies_legacy_remap_and_replacements() {
        assert_eq!(normalize_numeric_reference(0x26), ('&', None));
        assert_eq!(
            normalize_numeric_reference(0x80),
            ('\u{20AC}', Some(ParseErrorCode::ControlCharacterReference))
        );
        assert_eq!(
            normalize_numeric_reference(0x9F),
            ('\u{178}', Some(ParseErrorCode::ControlCharacterReference))
        );
        assert_eq!(
            normalize_numeric_reference(0),
            ('\u{FFFD}', Some(ParseErrorCode::NullCharacterReference))
        );
        assert_eq!(
            normalize_numeric_reference(0xD800),
            ('\u{FFFD}', Some(ParseErrorCode::SurrogateCharacterReference))
        );
        assert_eq!(
            normalize_numeric_reference(0x110000),
            (
                '\u{FFFD}',
                Some(ParseErrorCode::CharacterReferenceOutsideUnicodeRange)
            )
        );
        // Whitespace controls pass through unflagged.
        assert_eq!(normalize_numeric_reference(0x0A), ('\n', None));
    }
}
