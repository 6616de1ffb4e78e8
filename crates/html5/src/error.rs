//! Parse errors for tokenization/tree construction.
//!
//! Parse errors are advisory: every malformed construct has a defined recovery
//! and parsing always continues. Engine invariant violations are the one hard
//! failure class and live in `sink`.

/// Error codes for the malformed constructs the recovery tables name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorCode {
    AbruptClosingOfEmptyComment,
    AbruptDoctypePublicIdentifier,
    AbruptDoctypeSystemIdentifier,
    AbsenceOfDigitsInNumericCharacterReference,
    CdataInHtmlContent,
    CharacterReferenceOutsideUnicodeRange,
    ControlCharacterReference,
    DuplicateAttribute,
    EndTagWithAttributes,
    EndTagWithTrailingSolidus,
    EofBeforeTagName,
    EofInCdata,
    EofInComment,
    EofInDoctype,
    EofInScriptHtmlCommentLikeText,
    EofInTag,
    EofInText,
    IncorrectlyClosedComment,
    IncorrectlyOpenedComment,
    InvalidCharacterSequenceAfterDoctypeName,
    InvalidFirstCharacterOfTagName,
    MisplacedDoctype,
    MisplacedStartTag,
    MissingAttributeValue,
    MissingDoctype,
    MissingDoctypeName,
    MissingDoctypePublicIdentifier,
    MissingDoctypeSystemIdentifier,
    MissingEndTagName,
    MissingQuoteBeforeDoctypeIdentifier,
    MissingSemicolonAfterCharacterReference,
    MissingWhitespaceAfterDoctypeKeyword,
    MissingWhitespaceBeforeDoctypeName,
    MissingWhitespaceBetweenAttributes,
    MissingWhitespaceBetweenDoctypeIdentifiers,
    NestedComment,
    NonVoidHtmlElementStartTagWithTrailingSolidus,
    NoncharacterCharacterReference,
    NullCharacterReference,
    SurrogateCharacterReference,
    UnexpectedCharacterAfterDoctypeSystemIdentifier,
    UnexpectedCharacterInAttributeName,
    UnexpectedCharacterInUnquotedAttributeValue,
    UnexpectedEndTag,
    UnexpectedEof,
    UnexpectedEqualsSignBeforeAttributeName,
    UnexpectedNullCharacter,
    UnexpectedQuestionMarkInsteadOfTagName,
    UnexpectedSolidusInTag,
    UnexpectedStartTag,
    UnexpectedToken,
    UnknownNamedCharacterReference,
}

/// Advisory parse error with the byte position the input stream had when the
/// error was detected (monotonic across dropped chunks).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub code: ParseErrorCode,
    pub position: usize,
}
