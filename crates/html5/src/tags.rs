//! Static tag classification tables used throughout tree construction.

use crate::sink::Namespace;

/// The "special" element category. Membership decides furthest-block search in
/// the adoption agency and the any-other-end-tag walk.
pub(crate) fn is_special(name: &str, ns: Namespace) -> bool {
    match ns {
        Namespace::Html => matches!(
            name,
            "address"
                | "applet"
                | "area"
                | "article"
                | "aside"
                | "base"
                | "basefont"
                | "bgsound"
                | "blockquote"
                | "body"
                | "br"
                | "button"
                | "caption"
                | "center"
                | "col"
                | "colgroup"
                | "dd"
                | "details"
                | "dir"
                | "div"
                | "dl"
                | "dt"
                | "embed"
                | "fieldset"
                | "figcaption"
                | "figure"
                | "footer"
                | "form"
                | "frame"
                | "frameset"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "head"
                | "header"
                | "hgroup"
                | "hr"
                | "html"
                | "iframe"
                | "img"
                | "input"
                | "keygen"
                | "li"
                | "link"
                | "listing"
                | "main"
                | "marquee"
                | "menu"
                | "meta"
                | "nav"
                | "noembed"
                | "noframes"
                | "noscript"
                | "object"
                | "ol"
                | "p"
                | "param"
                | "plaintext"
                | "pre"
                | "script"
                | "search"
                | "section"
                | "select"
                | "source"
                | "style"
                | "summary"
                | "table"
                | "tbody"
                | "td"
                | "template"
                | "textarea"
                | "tfoot"
                | "th"
                | "thead"
                | "title"
                | "tr"
                | "track"
                | "ul"
                | "wbr"
                | "xmp"
        ),
        Namespace::MathMl => {
            matches!(name, "mi" | "mo" | "mn" | "ms" | "mtext" | "annotation-xml")
        }
        Namespace::Svg => matches!(name, "foreignObject" | "desc" | "title"),
        _ => false,
    }
}

/// Formatting elements eligible for the active-formatting list.
pub(crate) fn is_formatting(name: &str) -> bool {
    matches!(
        name,
        "a" | "b"
            | "big"
            | "code"
            | "em"
            | "font"
            | "i"
            | "nobr"
            | "s"
            | "small"
            | "strike"
            | "strong"
            | "tt"
            | "u"
    )
}

/// Tags closed by implied end-tag generation.
pub(crate) fn is_implied_end_tag(name: &str) -> bool {
    matches!(
        name,
        "p" | "rb" | "rp" | "rt" | "rtc" | "dd" | "dt" | "li" | "option" | "optgroup" | "menuitem"
    )
}

/// Tags closed by *thorough* implied end-tag generation (template teardown).
pub(crate) fn is_implied_end_tag_thorough(name: &str) -> bool {
    is_implied_end_tag(name)
        || matches!(
            name,
            "caption" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead" | "tr"
        )
}

pub(crate) fn is_numbered_header(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Elements that redirect insertion to a foster parent while table modes are
/// misnested.
pub(crate) fn is_table_foster_target(name: &str) -> bool {
    matches!(name, "table" | "tbody" | "tfoot" | "thead" | "tr")
}
