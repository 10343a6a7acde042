//! LcgvWelfarelist XML → [`WelfareCard`] conversion.
//!
//! The feed's tag presence varies with the query parameters, so every
//! field read tolerates an absent or empty tag and yields `""`. Only a
//! document that is not well-formed XML fails, and it fails as a whole.

use std::sync::LazyLock;

use regex::Regex;
use roxmltree::{Document, Node};
use tracing::{debug, instrument};
use welfarebridge_shared::{Region, Result, WelfareBridgeError, WelfareCard};

// ---------------------------------------------------------------------------
// Feed tag names
// ---------------------------------------------------------------------------

/// Repeated record element.
const RECORD_TAG: &str = "servList";

const TAG_TITLE: &str = "servNm";
const TAG_SUMMARY: &str = "servDgst";
const TAG_LINK: &str = "servDtlLink";
/// Managing department, then the two fallbacks, in priority order.
const TAGS_AGENCY: [&str; 3] = ["bizChrDeptNm", "jurMnofNm", "jurOrgNm"];
const TAG_CYCLE: &str = "sprtCycNm";
const TAG_PHONE: &str = "inqrTelNo";
const TAG_TARGETS: &str = "trgterIndvdlNmArray";
const TAG_TARGET_SINGLE: &str = "trgterIndvdlNm";
const TAG_PROVINCE: &str = "ctpvNm";
const TAG_DISTRICT: &str = "sggNm";
const TAG_LAST_MODIFIED: &str = "lastModYmd";

/// Support-cycle values meaning "apply any time".
const ALWAYS_OPEN_CYCLES: [&str; 2] = ["상시", "수시"];

/// Literal used for always-open programs.
pub const ONGOING_APPLICATION: &str = "ongoing application";

static YMD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{8}$").expect("yyyymmdd regex"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a listing payload into cards, one per record element, in order.
///
/// Zero record elements yields an empty vector.
#[instrument(skip_all, fields(bytes = xml.len()))]
pub fn parse_cards(xml: &str) -> Result<Vec<WelfareCard>> {
    let doc = Document::parse(xml)
        .map_err(|e| WelfareBridgeError::parse(format!("listing XML is not well-formed: {e}")))?;

    let cards: Vec<WelfareCard> = doc
        .descendants()
        .filter(|n| n.has_tag_name(RECORD_TAG))
        .map(card_from_record)
        .collect();

    debug!(cards = cards.len(), "listing parsed");
    Ok(cards)
}

fn card_from_record(item: Node<'_, '_>) -> WelfareCard {
    let agency = TAGS_AGENCY
        .iter()
        .map(|tag| child_text(item, tag))
        .find(|v| !v.is_empty())
        .unwrap_or_default();

    WelfareCard {
        title: child_text(item, TAG_TITLE),
        summary: child_text(item, TAG_SUMMARY),
        link: child_text(item, TAG_LINK),
        agency,
        application_period: application_period(&child_text(item, TAG_CYCLE)),
        phone: child_text(item, TAG_PHONE),
        eligibility: eligibility(
            &child_text(item, TAG_TARGETS),
            || child_text(item, TAG_TARGET_SINGLE),
        ),
        region: Region {
            province: child_text(item, TAG_PROVINCE),
            district: child_text(item, TAG_DISTRICT),
        },
        last_modified: normalize_ymd(&child_text(item, TAG_LAST_MODIFIED)),
    }
}

/// Text of the first direct child named `tag`, entity-decoded and trimmed.
///
/// Text nodes split by comments are joined. roxmltree already resolves XML
/// entities; the feed additionally double-escapes HTML entities
/// (`&amp;middot;`), which are decoded here.
fn child_text(parent: Node<'_, '_>, tag: &str) -> String {
    let Some(node) = parent.children().find(|n| n.has_tag_name(tag)) else {
        return String::new();
    };
    let raw: String = node
        .children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    html_escape::decode_html_entities(&raw).trim().to_string()
}

/// Map a support-cycle name onto the application-period label.
pub fn application_period(cycle: &str) -> String {
    if ALWAYS_OPEN_CYCLES.contains(&cycle) {
        ONGOING_APPLICATION.to_string()
    } else if !cycle.is_empty() {
        format!("{cycle} application")
    } else {
        String::new()
    }
}

/// Re-join a comma-delimited target list, falling back to the singular tag.
fn eligibility(csv: &str, single: impl FnOnce() -> String) -> String {
    let joined = csv
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    if joined.is_empty() { single() } else { joined }
}

/// `20230115` → `2023-01-15`; anything else passes through unchanged.
pub fn normalize_ymd(raw: &str) -> String {
    if YMD_RE.is_match(raw) {
        format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..8])
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(items: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <wantedList><totalCount>0</totalCount>{items}</wantedList>"
        )
    }

    #[test]
    fn parse_fixture_in_source_order() {
        let xml = std::fs::read_to_string("../../../fixtures/xml/lcgv-welfare-list.xml")
            .expect("read fixture");
        let cards = parse_cards(&xml).unwrap();

        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].title, "어르신 무료 급식 지원");
        assert_eq!(cards[1].title, "청년 월세 한시 특별지원");
        assert_eq!(cards[2].title, "중장년 재취업 교육비 지원");

        let first = &cards[0];
        assert_eq!(first.agency, "서울특별시 종로구 어르신복지과");
        assert_eq!(first.application_period, ONGOING_APPLICATION);
        assert_eq!(first.phone, "02-2148-1234");
        assert_eq!(first.eligibility, "저소득, 노년");
        assert_eq!(first.region.province, "서울특별시");
        assert_eq!(first.region.district, "종로구");
        assert_eq!(first.last_modified, "2023-01-15");
        assert!(first.link.starts_with("https://www.bokjiro.go.kr/"));
    }

    #[test]
    fn fixture_fallbacks_and_entities() {
        let xml = std::fs::read_to_string("../../../fixtures/xml/lcgv-welfare-list.xml")
            .expect("read fixture");
        let cards = parse_cards(&xml).unwrap();

        // agency falls back to jurOrgNm; eligibility falls back to the singular tag
        let second = &cards[1];
        assert_eq!(second.agency, "경기도 성남시");
        assert_eq!(second.eligibility, "청년");
        assert_eq!(second.application_period, "월 application");
        assert_eq!(second.summary, "월세 최대 20만원 · 12개월 지원");

        // every optional tag absent
        let third = &cards[2];
        assert_eq!(third.summary, "");
        assert_eq!(third.agency, "");
        assert_eq!(third.application_period, "");
        assert_eq!(third.eligibility, "");
        assert_eq!(third.region, Region::default());
        assert_eq!(third.last_modified, "");
    }

    #[test]
    fn zero_records_is_empty_not_error() {
        let cards = parse_cards(&wrap("")).unwrap();
        assert!(cards.is_empty());
    }

    #[test]
    fn record_with_only_title() {
        let cards = parse_cards(&wrap("<servList><servNm>X</servNm></servList>")).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(
            cards[0],
            WelfareCard {
                title: "X".into(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn empty_record_element_yields_blank_card() {
        let cards = parse_cards(&wrap("<servList/><servList></servList>")).unwrap();
        assert_eq!(cards.len(), 2);
        assert!(cards.iter().all(|c| *c == WelfareCard::default()));
    }

    #[test]
    fn agency_priority_order() {
        let xml = wrap(
            "<servList><bizChrDeptNm> </bizChrDeptNm><jurMnofNm>보건복지부</jurMnofNm>\
             <jurOrgNm>다른기관</jurOrgNm></servList>",
        );
        let cards = parse_cards(&xml).unwrap();
        assert_eq!(cards[0].agency, "보건복지부");
    }

    #[test]
    fn eligibility_split_trim_and_drop_empty() {
        let xml = wrap(
            "<servList><trgterIndvdlNmArray> 장애인 ,,저소득, </trgterIndvdlNmArray>\
             <trgterIndvdlNm>무시됨</trgterIndvdlNm></servList>",
        );
        let cards = parse_cards(&xml).unwrap();
        assert_eq!(cards[0].eligibility, "장애인, 저소득");
    }

    #[test]
    fn only_direct_children_are_read() {
        let xml = wrap("<servList><nested><servNm>inner</servNm></nested></servList>");
        let cards = parse_cards(&xml).unwrap();
        assert_eq!(cards[0].title, "");
    }

    #[test]
    fn text_around_comments_is_joined() {
        let xml = wrap(
            "<servList><servNm><!-- c -->Title</servNm><servDgst>A<!--x-->B</servDgst></servList>",
        );
        let cards = parse_cards(&xml).unwrap();
        assert_eq!(cards[0].title, "Title");
        assert_eq!(cards[0].summary, "AB");
    }

    #[test]
    fn html_entities_are_decoded() {
        let xml = wrap("<servList><servNm>A &amp;amp; B &amp;lt;긴급&amp;gt;</servNm></servList>");
        let cards = parse_cards(&xml).unwrap();
        assert_eq!(cards[0].title, "A & B <긴급>");
    }

    #[test]
    fn malformed_xml_fails_whole_call() {
        let xml = "<wantedList><servList><servNm>ok</servNm></servList><servList>";
        let err = parse_cards(xml).unwrap_err();
        assert!(matches!(err, WelfareBridgeError::Parse { .. }));
    }

    #[test]
    fn cycle_normalization() {
        assert_eq!(application_period("상시"), ONGOING_APPLICATION);
        assert_eq!(application_period("수시"), ONGOING_APPLICATION);
        assert_eq!(application_period("monthly"), "monthly application");
        assert_eq!(application_period(""), "");
    }

    #[test]
    fn ymd_normalization() {
        assert_eq!(normalize_ymd("20230115"), "2023-01-15");
        assert_eq!(normalize_ymd(""), "");
        assert_eq!(normalize_ymd("not-a-date"), "not-a-date");
        assert_eq!(normalize_ymd("2023011"), "2023011");
        assert_eq!(normalize_ymd("2023-01-15"), "2023-01-15");
    }
}
