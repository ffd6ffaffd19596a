use inbox_otp::*;

const MULTIPART_QP: &str = "From: Service <noreply@service.example>\r\n\
To: user@inbox.example\r\n\
Subject: Your sign-in code\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"==b0undary42\"\r\n\
\r\n\
--==b0undary42\r\n\
Content-Type: text/plain; charset=\"utf-8\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Hi there,=0A=0AYour verification code is 4829=\r\n\
13.\r\n\
\r\n\
--==b0undary42\r\n\
Content-Type: text/html; charset=\"utf-8\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
<p style=3D\"color:red\">Your verification code is <b>482913</b></p>\r\n\
--==b0undary42--\r\n";

#[test]
fn test_parse_multipart_quoted_printable() {
    let parts = parse_body(MULTIPART_QP, Fallback::default());

    assert_eq!(parts.text, "Hi there,\n\nYour verification code is 482913.");
    assert_eq!(
        parts.html,
        "<p style=\"color:red\">Your verification code is <b>482913</b></p>"
    );
}

#[test]
fn test_context_tracks_boundary_and_encoding() {
    let ctx = ExtractionContext::scan(MULTIPART_QP);

    assert_eq!(ctx.boundary(), Some("==b0undary42"));
    assert_eq!(ctx.current_encoding(), TransferEncoding::QuotedPrintable);
    assert_eq!(ctx.current_part(), Part::Html);
    assert_eq!(ctx.state(), ScanState::Body);
}

#[test]
fn test_mime_header_lines_never_reach_output() {
    let raw = "Subject: x\n\
Content-Type: multipart/mixed; boundary=XYZ\n\
\n\
--XYZ\n\
Content-Type: text/plain\n\
Content-Disposition: inline\n\
Content-ID: <part1>\n\
content-language: en\n\
\n\
plain body\n\
--XYZ\n\
Content-Type: text/html\n\
CONTENT-DESCRIPTION: html part\n\
\n\
<i>html body</i>\n\
--XYZ--\n";

    let ctx = ExtractionContext::scan(raw);
    for line in ctx.text().lines().chain(ctx.html().lines()) {
        assert!(
            !line.trim_start().to_ascii_lowercase().starts_with("content-"),
            "header leaked: {line}"
        );
        assert!(!line.contains("XYZ"), "boundary leaked: {line}");
    }

    let parts = parse_body(raw, Fallback::default());
    assert_eq!(parts.text, "plain body");
    assert_eq!(parts.html, "<i>html body</i>");
}

#[test]
fn test_single_part_html() {
    let raw = b"From: a@b.c\r\nContent-Type: text/html; charset=utf-8\r\n\r\n<h1>Hello</h1>\r\n";
    let text = decode_bytes(raw, Fallback::default()).into_text();
    let parts = parse_body(&text, Fallback::default());

    assert!(parts.text.is_empty());
    assert_eq!(parts.html, "<h1>Hello</h1>");
}

#[test]
fn test_base64_body() {
    // "验证码：482913"
    let raw = "Subject: b64\n\
Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: base64\n\
\n\
6aqM6K+B56CB77yaNDgyOTEz\n";
    let parts = parse_body(raw, Fallback::default());

    assert_eq!(parts.text, "验证码：482913");
    assert_eq!(extract_code(&parts.text, &parts.html).as_deref(), Some("482913"));
}

#[test]
fn test_invalid_base64_is_kept() {
    let raw = "Content-Transfer-Encoding: base64\n\nnot *really* base64\n";
    let parts = parse_body(raw, Fallback::default());

    assert_eq!(parts.text, "not *really* base64");
}

#[test]
fn test_folded_charset_parameter_is_skipped() {
    let raw = "Subject: x\n\nContent-Type: text/plain;\n\tcharset=utf-8\n\nCode: 551234\n";
    let parts = parse_body(raw, Fallback::default());

    assert_eq!(parts.text, "Code: 551234");
}

#[test]
fn test_leaked_charset_preamble_is_removed() {
    // "charset=utf-8\n\nCode: 551234"
    let raw = "Content-Transfer-Encoding: base64\n\nY2hhcnNldD11dGYtOAoKQ29kZTogNTUxMjM0\n";
    let parts = parse_body(raw, Fallback::default());

    assert_eq!(parts.text, "Code: 551234");
}

#[test]
fn test_soft_break_artifacts_without_declared_encoding() {
    let raw = "Subject: x\n\nYour code=\nis here=\n\n123456=\n";
    let parts = parse_body(raw, Fallback::default());

    assert_eq!(parts.text, "Your codeis here\n123456");
}

#[test]
fn test_empty_and_header_only_messages() {
    assert_eq!(parse_body("", Fallback::default()), DecodedParts::default());

    let parts = parse_body("Subject: nothing\r\nFrom: a@b.c\r\n", Fallback::default());
    assert!(parts.is_empty());
}

#[test]
fn test_quoted_printable_scenario() {
    let raw = "Subject: x\nContent-Transfer-Encoding: quoted-printable\n\nCode=3A 937421=\n";
    let parts = parse_body(raw, Fallback::default());

    assert_eq!(parts.text, "Code: 937421");
    assert_eq!(extract_code(&parts.text, &parts.html).as_deref(), Some("937421"));
}

#[test]
fn test_indented_content_line_is_kept() {
    let raw = "Subject: x\n\n  Content-rich updates for you\nCode: 551234\n";
    let parts = parse_body(raw, Fallback::default());

    assert_eq!(parts.text, "Content-rich updates for you\nCode: 551234");
}
