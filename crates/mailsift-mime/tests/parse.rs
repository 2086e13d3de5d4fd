//! End-to-end parsing tests.
//!
//! Messages are built inline so each test shows the exact bytes it feeds
//! to the parser.

#![allow(clippy::unwrap_used)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use mailsift_mime::{Issue, ParseOptions, Parser, parse};

/// Builds a message with the given top-level headers and body.
fn message(headers: &[&str], body: &str) -> Vec<u8> {
    let mut raw = String::new();
    for header in headers {
        raw.push_str(header);
        raw.push_str("\r\n");
    }
    raw.push_str("\r\n");
    raw.push_str(body);
    raw.into_bytes()
}

#[test]
fn test_single_part_identity_is_raw_body() {
    let body = "Line one\r\n  indented =3D not decoded\r\n\r\nLast line";
    let raw = message(&["From: a@example.com", "Content-Type: text/plain"], body);

    let parsed = parse(&raw).unwrap();
    assert_eq!(parsed.content, body.as_bytes());
}

#[test]
fn test_header_fields() {
    let raw = message(
        &[
            "From: =?utf-8?Q?Ana=C3=AFs?= <anais@example.com>",
            "To: one@example.com, two@example.com",
            "Cc: three@example.com",
            "Subject: =?utf-8?B?UmU6IHLDqXN1bcOp?=",
            "Date: 1 Jan 2024 10:00:00 +0000",
        ],
        "hi",
    );

    let parsed = parse(&raw).unwrap();
    assert_eq!(parsed.from, ["Anaïs <anais@example.com>"]);
    assert_eq!(parsed.to, ["one@example.com", "two@example.com"]);
    assert_eq!(parsed.cc, ["three@example.com"]);
    assert_eq!(parsed.subject, "Re: résumé");
    assert_eq!(
        parsed.send_date,
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    );
}

#[test]
fn test_unparsable_date_is_default_and_parse_succeeds() {
    let raw = message(&["Date: the day after tomorrow", "Subject: ok"], "body");

    let parsed = parse(&raw).unwrap();
    assert_eq!(parsed.send_date, DateTime::<Utc>::default());
    assert_eq!(parsed.subject, "ok");
    assert_eq!(parsed.content, b"body");
}

#[test]
fn test_multipart_concatenates_in_encounter_order() {
    let body = concat!(
        "This is the preamble.\r\n",
        "--outer\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "caf=C3=A9 \r\n",
        "--outer\r\n",
        "Content-Type: text/html\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "PHA+aGk8L3A+\r\n",
        "--outer--\r\n",
        "epilogue\r\n",
    );
    let raw = message(&["Content-Type: multipart/alternative; boundary=\"outer\""], body);

    for _ in 0..3 {
        let parsed = Parser::default().parse_detailed(&raw).unwrap();
        let parts = parsed.parts.unwrap();
        assert_eq!(parts.names().collect::<Vec<_>>(), ["outer-1.txt", "outer-1.html"]);
        assert_eq!(parsed.message.content, "café<p>hi</p>".as_bytes());
    }
}

#[test]
fn test_binary_named_part_is_excluded_but_kept() {
    let body = concat!(
        "--b1\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "readable\r\n",
        "--b1\r\n",
        "Content-Type: text/plain\r\n",
        "Content-Disposition: attachment; filename=\"virus.bin\"\r\n",
        "\r\n",
        "this text is still excluded\r\n",
        "--b1\r\n",
        "Content-Type: application/x-never-registered\r\n",
        "\r\n",
        "opaque\r\n",
        "--b1--\r\n",
    );
    let raw = message(&["Content-Type: multipart/mixed; boundary=b1"], body);

    let parsed = Parser::default().parse_detailed(&raw).unwrap();
    let parts = parsed.parts.unwrap();
    assert_eq!(parts.get("virus.bin"), Some(&b"this text is still excluded"[..]));
    assert_eq!(parts.get("b1-1.bin"), Some(&b"opaque"[..]));
    assert_eq!(parsed.message.content, b"readable");
}

#[test]
fn test_nested_depth_three_is_flattened() {
    let body = concat!(
        "--l1\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "depth one\r\n",
        "--l1\r\n",
        "Content-Type: multipart/related; boundary=l2\r\n",
        "\r\n",
        "--l2\r\n",
        "Content-Type: multipart/alternative; boundary=l3\r\n",
        "\r\n",
        "--l3\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "depth three\r\n",
        "--l3\r\n",
        "Content-Type: text/html\r\n",
        "\r\n",
        "<i>three</i>\r\n",
        "--l3--\r\n",
        "--l2\r\n",
        "Content-Type: image/png\r\n",
        "Content-Disposition: inline; filename=logo.png\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "iVBORw==\r\n",
        "--l2--\r\n",
        "--l1--\r\n",
    );
    let raw = message(&["Content-Type: multipart/mixed; boundary=l1"], body);

    let parsed = Parser::default().parse_detailed(&raw).unwrap();
    let parts = parsed.parts.unwrap();
    assert_eq!(
        parts.names().collect::<Vec<_>>(),
        ["l1-1.txt", "l3-1.txt", "l3-1.html", "logo.png"]
    );
    assert_eq!(parts.get("logo.png"), Some(&[0x89, b'P', b'N', b'G'][..]));
    assert!(parsed.issues.is_empty());
}

#[test]
fn test_depth_limit_skips_deeper_bodies() {
    let body = concat!(
        "--l1\r\n",
        "Content-Type: multipart/mixed; boundary=l2\r\n",
        "\r\n",
        "--l2\r\n",
        "Content-Type: multipart/mixed; boundary=l3\r\n",
        "\r\n",
        "--l3\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "too deep\r\n",
        "--l3--\r\n",
        "--l2\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "depth two\r\n",
        "--l2--\r\n",
        "--l1--\r\n",
    );
    let raw = message(&["Content-Type: multipart/mixed; boundary=l1"], body);

    let parser = Parser::new(ParseOptions { max_depth: 2 });
    let parsed = parser.parse_detailed(&raw).unwrap();
    assert_eq!(parsed.message.content, b"depth two");
    assert_eq!(
        parsed.issues,
        vec![Issue::DepthExceeded {
            boundary: "l3".to_string(),
            depth: 3
        }]
    );
}

#[test]
fn test_bad_base64_does_not_abort_siblings() {
    let body = concat!(
        "--b1\r\n",
        "Content-Type: text/html\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "@@@ definitely not base64 @@@\r\n",
        "--b1\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "sibling survives\r\n",
        "--b1--\r\n",
    );
    let raw = message(&["Content-Type: multipart/mixed; boundary=b1"], body);

    let parsed = Parser::default().parse_detailed(&raw).unwrap();
    assert_eq!(parsed.message.content, b"sibling survives");
    assert!(!parsed.parts.unwrap().contains("b1-1.html"));
    assert_eq!(parsed.issues.len(), 1);
}

#[test]
fn test_single_part_quoted_printable_keeps_stray_equals() {
    let raw = message(
        &["Content-Transfer-Encoding: quoted-printable"],
        "See https://x.example/?a=b&c=d for details",
    );

    let parsed = Parser::default().parse_detailed(&raw).unwrap();
    assert_eq!(
        parsed.message.content,
        b"See https://x.example/?a=b&c=d for details"
    );
    assert!(parsed.issues.is_empty());
}

#[test]
fn test_multipart_quoted_printable_keeps_stray_equals() {
    let body = concat!(
        "--b\r\n",
        "Content-Type: text/plain\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "price = 5, caf=C3=A9\r\n",
        "--b--\r\n",
    );
    let raw = message(&["Content-Type: multipart/mixed; boundary=b"], body);

    let parsed = Parser::default().parse_detailed(&raw).unwrap();
    assert_eq!(parsed.message.content, "price = 5, café".as_bytes());
    assert_eq!(parsed.parts.unwrap().names().collect::<Vec<_>>(), ["b-1.txt"]);
    assert!(parsed.issues.is_empty());
}

#[test]
fn test_base64_with_trailing_bits_decodes() {
    let raw = message(&["Content-Transfer-Encoding: base64"], "QR==");

    let parsed = parse(&raw).unwrap();
    assert_eq!(parsed.content, b"A");
}

#[test]
fn test_parameter_without_value_gives_empty_name() {
    let body = concat!(
        "--b1\r\n",
        "Content-Type: text/plain; charset\r\n",
        "\r\n",
        "still stored\r\n",
        "--b1--\r\n",
    );
    let raw = message(&["Content-Type: multipart/mixed; boundary=b1"], body);

    let parsed = Parser::default().parse_detailed(&raw).unwrap();
    assert_eq!(parsed.parts.unwrap().names().collect::<Vec<_>>(), [""]);
    assert_eq!(parsed.message.content, b"still stored");
}

#[test]
fn test_siblings_without_filename_share_a_buffer() {
    let body = concat!(
        "--b1\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "first \r\n",
        "--b1\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "second\r\n",
        "--b1--\r\n",
    );
    let raw = message(&["Content-Type: multipart/mixed; boundary=b1"], body);

    let parsed = Parser::default().parse_detailed(&raw).unwrap();
    let parts = parsed.parts.unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts.get("b1-1.txt"), Some(&b"first second"[..]));
}

#[test]
fn test_part_without_content_type_gets_empty_name() {
    let body = concat!(
        "--b1\r\n",
        "X-Note: no content type here\r\n",
        "\r\n",
        "nameless\r\n",
        "--b1--\r\n",
    );
    let raw = message(&["Content-Type: multipart/mixed; boundary=b1"], body);

    let parsed = Parser::default().parse_detailed(&raw).unwrap();
    let parts = parsed.parts.unwrap();
    assert_eq!(parts.names().collect::<Vec<_>>(), [""]);
    assert_eq!(parsed.message.content, b"nameless");
}

#[test]
fn test_framing_failure_is_the_only_error() {
    assert!(parse(b"").is_err());
    assert!(parse(b"this line has no colon\r\n\r\nbody").is_err());
    assert!(parse(b"Content-Type: multipart/mixed; boundary=x\r\n\r\ngarbage").is_ok());
}

proptest! {
    #[test]
    fn prop_base64_body_round_trips(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
        let encoded = STANDARD.encode(&payload);
        let mut raw = b"Content-Type: application/pdf\r\nContent-Transfer-Encoding: base64\r\n\r\n".to_vec();
        raw.extend_from_slice(encoded.as_bytes());

        let parsed = parse(&raw).unwrap();
        prop_assert_eq!(&parsed.content, &payload);
        prop_assert_eq!(STANDARD.encode(&parsed.content), encoded);
    }

    #[test]
    fn prop_identity_body_is_untouched(body in "[ -~\r\n]{0,256}") {
        let mut raw = b"Subject: prop\r\n\r\n".to_vec();
        raw.extend_from_slice(body.as_bytes());

        let parsed = parse(&raw).unwrap();
        prop_assert_eq!(parsed.content, body.into_bytes());
    }
}
