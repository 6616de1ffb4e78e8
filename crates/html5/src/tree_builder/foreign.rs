//! Foreign-content (SVG/MathML) adjustment tables and dispatch predicates.

use crate::sink::Namespace;
use crate::token::TagToken;

/// SVG tag names whose canonical casing differs from the lowercased token.
static SVG_TAG_ADJUSTMENTS: &[(&str, &str)] = &[
    ("altglyph", "altGlyph"),
    ("altglyphdef", "altGlyphDef"),
    ("altglyphitem", "altGlyphItem"),
    ("animatecolor", "animateColor"),
    ("animatemotion", "animateMotion"),
    ("animatetransform", "animateTransform"),
    ("clippath", "clipPath"),
    ("feblend", "feBlend"),
    ("fecolormatrix", "feColorMatrix"),
    ("fecomponenttransfer", "feComponentTransfer"),
    ("fecomposite", "feComposite"),
    ("feconvolvematrix", "feConvolveMatrix"),
    ("fediffuselighting", "feDiffuseLighting"),
    ("fedisplacementmap", "feDisplacementMap"),
    ("fedistantlight", "feDistantLight"),
    ("fedropshadow", "feDropShadow"),
    ("feflood", "feFlood"),
    ("fefunca", "feFuncA"),
    ("fefuncb", "feFuncB"),
    ("fefuncg", "feFuncG"),
    ("fefuncr", "feFuncR"),
    ("fegaussianblur", "feGaussianBlur"),
    ("feimage", "feImage"),
    ("femerge", "feMerge"),
    ("femergenode", "feMergeNode"),
    ("femorphology", "feMorphology"),
    ("feoffset", "feOffset"),
    ("fepointlight", "fePointLight"),
    ("fespecularlighting", "feSpecularLighting"),
    ("fespotlight", "feSpotLight"),
    ("fetile", "feTile"),
    ("feturbulence", "feTurbulence"),
    ("foreignobject", "foreignObject"),
    ("glyphref", "glyphRef"),
    ("lineargradient", "linearGradient"),
    ("radialgradient", "radialGradient"),
    ("textpath", "textPath"),
];

/// SVG attribute names whose canonical casing differs.
static SVG_ATTR_ADJUSTMENTS: &[(&str, &str)] = &[
    ("attributename", "attributeName"),
    ("attributetype", "attributeType"),
    ("basefrequency", "baseFrequency"),
    ("baseprofile", "baseProfile"),
    ("calcmode", "calcMode"),
    ("clippathunits", "clipPathUnits"),
    ("diffuseconstant", "diffuseConstant"),
    ("edgemode", "edgeMode"),
    ("filterunits", "filterUnits"),
    ("glyphref", "glyphRef"),
    ("gradienttransform", "gradientTransform"),
    ("gradientunits", "gradientUnits"),
    ("kernelmatrix", "kernelMatrix"),
    ("kernelunitlength", "kernelUnitLength"),
    ("keypoints", "keyPoints"),
    ("keysplines", "keySplines"),
    ("keytimes", "keyTimes"),
    ("lengthadjust", "lengthAdjust"),
    ("limitingconeangle", "limitingConeAngle"),
    ("markerheight", "markerHeight"),
    ("markerunits", "markerUnits"),
    ("markerwidth", "markerWidth"),
    ("maskcontentunits", "maskContentUnits"),
    ("maskunits", "maskUnits"),
    ("numoctaves", "numOctaves"),
    ("pathlength", "pathLength"),
    ("patterncontentunits", "patternContentUnits"),
    ("patterntransform", "patternTransform"),
    ("patternunits", "patternUnits"),
    ("pointsatx", "pointsAtX"),
    ("pointsaty", "pointsAtY"),
    ("pointsatz", "pointsAtZ"),
    ("preservealpha", "preserveAlpha"),
    ("preserveaspectratio", "preserveAspectRatio"),
    ("primitiveunits", "primitiveUnits"),
    ("refx", "refX"),
    ("refy", "refY"),
    ("repeatcount", "repeatCount"),
    ("repeatdur", "repeatDur"),
    ("requiredextensions", "requiredExtensions"),
    ("requiredfeatures", "requiredFeatures"),
    ("specularconstant", "specularConstant"),
    ("specularexponent", "specularExponent"),
    ("spreadmethod", "spreadMethod"),
    ("startoffset", "startOffset"),
    ("stddeviation", "stdDeviation"),
    ("stitchtiles", "stitchTiles"),
    ("surfacescale", "surfaceScale"),
    ("systemlanguage", "systemLanguage"),
    ("tablevalues", "tableValues"),
    ("targetx", "targetX"),
    ("targety", "targetY"),
    ("textlength", "textLength"),
    ("viewbox", "viewBox"),
    ("viewtarget", "viewTarget"),
    ("xchannelselector", "xChannelSelector"),
    ("ychannelselector", "yChannelSelector"),
    ("zoomandpan", "zoomAndPan"),
];

/// Namespaced attributes (XLink/XML/XMLNS) recognized in foreign content.
static FOREIGN_ATTR_ADJUSTMENTS: &[(&str, &'static str, &'static str, Namespace)] = &[
    ("xlink:actuate", "xlink", "actuate", Namespace::XLink),
    ("xlink:arcrole", "xlink", "arcrole", Namespace::XLink),
    ("xlink:href", "xlink", "href", Namespace::XLink),
    ("xlink:role", "xlink", "role", Namespace::XLink),
    ("xlink:show", "xlink", "show", Namespace::XLink),
    ("xlink:title", "xlink", "title", Namespace::XLink),
    ("xlink:type", "xlink", "type", Namespace::XLink),
    ("xml:lang", "xml", "lang", Namespace::Xml),
    ("xml:space", "xml", "space", Namespace::Xml),
    ("xmlns", "", "xmlns", Namespace::Xmlns),
    ("xmlns:xlink", "xmlns", "xlink", Namespace::Xmlns),
];

/// Start tags that break out of foreign content back into HTML parsing.
pub(crate) fn is_breakout_tag(token: &TagToken) -> bool {
    match token.name.as_str() {
        "b" | "big" | "blockquote" | "body" | "br" | "center" | "code" | "dd" | "div" | "dl"
        | "dt" | "em" | "embed" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "head" | "hr" | "i"
        | "img" | "li" | "listing" | "menu" | "meta" | "nobr" | "ol" | "p" | "pre" | "ruby"
        | "s" | "small" | "span" | "strong" | "strike" | "sub" | "sup" | "table" | "tt" | "u"
        | "ul" | "var" => true,
        "font" => token
            .attrs
            .iter()
            .any(|attr| matches!(attr.name.as_str(), "color" | "face" | "size")),
        _ => false,
    }
}

/// Case-adjust an SVG tag name per the fixed rewrite table.
pub(crate) fn adjust_svg_tag_name(token: &mut TagToken) {
    if let Ok(index) =
        SVG_TAG_ADJUSTMENTS.binary_search_by(|(from, _)| from.cmp(&token.name.as_str()))
    {
        token.name.clear();
        token.name.push_str(SVG_TAG_ADJUSTMENTS[index].1);
    }
}

pub(crate) fn adjust_svg_attributes(token: &mut TagToken) {
    for attr in &mut token.attrs {
        if let Ok(index) =
            SVG_ATTR_ADJUSTMENTS.binary_search_by(|(from, _)| from.cmp(&attr.name.as_str()))
        {
            attr.name.clear();
            attr.name.push_str(SVG_ATTR_ADJUSTMENTS[index].1);
        }
    }
}

pub(crate) fn adjust_mathml_attributes(token: &mut TagToken) {
    for attr in &mut token.attrs {
        if attr.name == "definitionurl" {
            attr.name.clear();
            attr.name.push_str("definitionURL");
        }
    }
}

pub(crate) fn adjust_foreign_attributes(token: &mut TagToken) {
    for attr in &mut token.attrs {
        if let Some((_, prefix, local, ns)) = FOREIGN_ATTR_ADJUSTMENTS
            .iter()
            .find(|(name, ..)| *name == attr.name)
        {
            attr.prefix = if prefix.is_empty() { None } else { Some(*prefix) };
            attr.ns = Some(*ns);
            attr.name.clear();
            attr.name.push_str(local);
        }
    }
}

/// MathML text integration points: HTML tokens parse as HTML inside them.
pub(crate) fn is_mathml_text_integration_point(name: &str, ns: Namespace) -> bool {
    ns == Namespace::MathMl && matches!(name, "mi" | "mo" | "mn" | "ms" | "mtext")
}

/// HTML integration points. `annotation-xml` qualifies only with an HTML-ish
/// `encoding` attribute, checked by the caller against the element attributes.
pub(crate) fn is_html_integration_point(
    name: &str,
    ns: Namespace,
    encoding: Option<&str>,
) -> bool {
    match ns {
        Namespace::Svg => matches!(name, "foreignObject" | "desc" | "title"),
        Namespace::MathMl => {
            name == "annotation-xml"
                && encoding.is_some_and(|value| {
                    value.eq_ignore_ascii_case("text/html")
                        || value.eq_ignore_ascii_case("application/xhtml+xml")
                })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Attribute, TagToken};

    #[test]
    fn adjustment_tables_are_sorted_for_binary_search() {
        assert!(
            SVG_TAG_ADJUSTMENTS.windows(2).all(|w| w[0].0 < w[1].0),
            "svg tag table must be sorted"
        );
        assert!(
            SVG_ATTR_ADJUSTMENTS.windows(2).all(|w| w[0].0 < w[1].0),
            "svg attribute table must be sorted"
        );
    }

    #[test]
    fn svg_tag_and_attribute_casing_is_restored() {
        let mut token = TagToken::new("foreignobject");
        adjust_svg_tag_name(&mut token);
        assert_eq!(token.name, "foreignObject");

        let mut token = TagToken::new("animate");
        token.attrs.push(Attribute::new("attributename", "x"));
        token.attrs.push(Attribute::new("dur", "1s"));
        adjust_svg_attributes(&mut token);
        assert_eq!(token.attrs[0].name, "attributeName");
        assert_eq!(token.attrs[1].name, "dur");
    }

    #[test]
    fn xlink_attributes_gain_namespace_and_prefix() {
        let mut token = TagToken::new("use");
        token.attrs.push(Attribute::new("xlink:href", "#a"));
        adjust_foreign_attributes(&mut token);
        assert_eq!(token.attrs[0].name, "href");
        assert_eq!(token.attrs[0].prefix, Some("xlink"));
        assert_eq!(token.attrs[0].ns, Some(Namespace::XLink));
    }

    #[test]
    fn font_breakout_depends_on_presentational_attributes() {
        let mut token = TagToken::new("font");
        assert!(!is_breakout_tag(&token));
        token.attrs.push(Attribute::new("color", "red"));
        assert!(is_breakout_tag(&token));
    }

    #[test]
    fn annotation_xml_integration_point_requires_html_encoding() {
        assert!(is_html_integration_point(
            "annotation-xml",
            Namespace::MathMl,
            Some("text/html")
        ));
        assert!(is_html_integration_point(
            "annotation-xml",
            Namespace::MathMl,
            Some("APPLICATION/XHTML+XML")
        ));
        assert!(!is_html_integration_point(
            "annotation-xml",
            Namespace::MathMl,
            Some("text/xml")
        ));
        assert!(!is_html_integration_point(
            "annotation-xml",
            Namespace::MathMl,
            None
        ));
        assert!(is_html_integration_point("desc", Namespace::Svg, None));
    }
}
