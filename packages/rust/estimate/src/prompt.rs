//! Income profile and prompt construction.

use std::path::Path;

use serde::{Deserialize, Serialize};
use welfarebridge_shared::{Result, WelfareBridgeError};

use crate::generation::Prompt;

/// Built-in system instruction, used when no prompt file is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
당신은 한국 복지 제도의 소득인정액과 소득분위를 추정하는 상담 도우미입니다.
사용자 정보와 참고 문서를 바탕으로 기준 중위소득 대비 비율과 예상 소득분위(1~10분위)를 추정하세요.
응답은 설명 없이 JSON 객체 하나로만 작성하고, 다음 키를 가진 \"summary\" 객체를 반드시 포함하세요:
incomeEval(월 소득평가액, 원), assetEval(월 재산의 소득환산액, 원), totalIncome(월 소득인정액, 원),
midRatio(기준 중위소득 대비 비율, %), expBracket(예상 소득분위).
값을 알 수 없으면 null을 사용하세요.";

/// Structured household finances submitted for estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeProfile {
    pub household_size: u32,
    /// Annual pre-tax salary, KRW.
    pub annual_salary: i64,
    /// Annual pension income, KRW.
    #[serde(default)]
    pub pension: i64,
    /// 자가 / 전세 / 월세 …
    pub housing_type: String,
    /// Financial and real-estate assets, KRW.
    #[serde(default)]
    pub assets: i64,
    #[serde(default)]
    pub debt: i64,
    #[serde(default)]
    pub car_info: String,
    #[serde(default)]
    pub has_disability: bool,
    #[serde(default)]
    pub employment_status: String,
    #[serde(default)]
    pub past_supported: bool,
}

impl IncomeProfile {
    /// Validate the fields a meaningful estimate cannot do without.
    pub fn validate(&self) -> Result<()> {
        if self.household_size == 0 {
            return Err(WelfareBridgeError::validation(
                "household_size must be at least 1",
            ));
        }
        if self.housing_type.trim().is_empty() {
            return Err(WelfareBridgeError::validation("housing_type is required"));
        }
        Ok(())
    }

    /// Query used to look up reference passages.
    pub fn retrieval_query(&self) -> String {
        format!(
            "{}인 가구 기준 중위소득 소득인정액 계산 방법 소득 분위 구간표 소득환산액 공식 {} 거주 공제 기준",
            self.household_size, self.housing_type
        )
    }

    /// Korean-labelled profile description embedded in the user message.
    pub fn describe(&self) -> String {
        let yes_no = |b: bool, yes: &str, no: &str| (if b { yes } else { no }).to_string();
        [
            format!("- 가구원 수: {}명", self.household_size),
            format!("- 연소득(세전): {}원", group_thousands(self.annual_salary)),
            format!("- 연금 소득: {}원", group_thousands(self.pension)),
            format!("- 주거 형태: {}", self.housing_type),
            format!("- 금융 및 부동산 자산: {}원", group_thousands(self.assets)),
            format!("- 부채: {}원", group_thousands(self.debt)),
            format!("- 차량 정보: {}", or_none(&self.car_info)),
            format!("- 장애 여부: {}", yes_no(self.has_disability, "있음", "없음")),
            format!("- 취업 상태: {}", or_none(&self.employment_status)),
            format!("- 연금 수령 여부: {}", yes_no(self.pension > 0, "예", "아니오")),
            format!("- 과거 복지 수급 이력: {}", yes_no(self.past_supported, "있음", "없음")),
        ]
        .join("\n")
    }

    /// Assemble the full prompt from a system instruction and references.
    pub fn to_prompt(&self, system: &str, references: &[String]) -> Prompt {
        let references = if references.is_empty() {
            "(없음)".to_string()
        } else {
            references.join("\n\n")
        };
        Prompt {
            system: system.to_string(),
            user: format!(
                "아래 사용자의 정보를 참고하여 소득분위(1~10분위 중)를 추정해줘.\n\n\
                 사용자 정보:\n{}\n\n참고 문서:\n{references}",
                self.describe()
            ),
        }
    }
}

/// Load a system prompt file, or fall back to [`DEFAULT_SYSTEM_PROMPT`].
pub fn load_system_prompt(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).map_err(|e| WelfareBridgeError::io(p, e)),
        None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
    }
}

fn or_none(s: &str) -> &str {
    if s.trim().is_empty() { "없음" } else { s }
}

/// `20000000` → `20,000,000`.
fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 { format!("-{out}") } else { out }
}
