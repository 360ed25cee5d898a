use serde::{Deserialize, Serialize};

/// One submission per (assignment, student). Only the grading fields ever change, once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_email: Option<String>,
    #[serde(default)]
    pub image_ids: Vec<String>,
    #[serde(default)]
    pub images_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_answer: Option<String>,
    /// 0 to 10.
    #[serde(default, with = "score", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default)]
    pub is_graded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_at: Option<String>,
}

/// `submitAssignment` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub assignment_id: String,
    pub student_id: String,
    pub student_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_answer: Option<String>,
}

/// `gradeSubmission` result.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GradeOutcome {
    #[serde(default, with = "score")]
    pub score: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// `gradeAllSubmissions` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    #[serde(default)]
    pub graded_count: u32,
    #[serde(default)]
    pub error_count: u32,
}

/// Scores come back from the spreadsheet as numbers or numeric strings.
///
/// Both are read into `f64`; blank strings, non-numeric text and values off the 0 to 10
/// scale read as no score.
pub mod score {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(score) => s.serialize_f64(*score),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(parse(&Value::deserialize(d)?))
    }

    pub const MAX: f64 = 10.0;

    pub fn parse(value: &Value) -> Option<f64> {
        let score = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
            _ => None,
        };
        score.filter(|it| (0.0..=MAX).contains(it))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn score_accepts_numbers_and_numeric_strings() {
        let from_number: GradeOutcome = serde_json::from_value(json!({ "score": 7.5 })).unwrap();
        let from_string: GradeOutcome = serde_json::from_value(json!({ "score": " 8 " })).unwrap();
        let from_comma: GradeOutcome = serde_json::from_value(json!({ "score": "6,5" })).unwrap();
        let blank: GradeOutcome = serde_json::from_value(json!({ "score": "" })).unwrap();
        let missing: GradeOutcome = serde_json::from_value(json!({})).unwrap();

        assert_eq!(from_number.score, Some(7.5));
        assert_eq!(from_string.score, Some(8.0));
        assert_eq!(from_comma.score, Some(6.5));
        assert_eq!(blank.score, None);
        assert_eq!(missing.score, None);
    }

    #[test]
    fn scores_off_the_scale_are_dropped() {
        assert_eq!(score::parse(&json!(0)), Some(0.0));
        assert_eq!(score::parse(&json!("10")), Some(10.0));
        assert_eq!(score::parse(&json!(10.5)), None);
        assert_eq!(score::parse(&json!("-1")), None);
        assert_eq!(score::parse(&json!("NaN")), None);
        assert_eq!(score::parse(&json!("inf")), None);
    }

    #[test]
    fn sheet_row_deserializes() {
        let submission: Submission = serde_json::from_value(json!({
            "id": "s1",
            "assignmentId": "a1",
            "studentId": "u1",
            "studentName": "Ana",
            "imageIds": ["f1", "f2"],
            "imagesCount": 2,
            "score": "9",
            "isGraded": true,
            "submittedAt": "2024-03-01T10:00:00.000Z"
        }))
        .expect("row should deserialize");

        assert_eq!(submission.score, Some(9.0));
        assert!(submission.is_graded);
        assert_eq!(submission.text_answer, None);

        let back = serde_json::to_value(&submission).unwrap();
        assert_eq!(back["score"], json!(9.0));
    }

    #[test]
    fn payload_skips_absent_fields() {
        let payload = NewSubmission {
            assignment_id: "a1".into(),
            student_id: "u1".into(),
            student_name: "Ana".into(),
            student_email: None,
            images: None,
            text_answer: Some("42".into()),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "assignmentId": "a1",
                "studentId": "u1",
                "studentName": "Ana",
                "textAnswer": "42"
            })
        );
    }
}
