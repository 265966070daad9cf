use realty_shared::Grade;

use super::config::GradeThresholds;

/// Letter grade for a 0-100 score; each threshold is inclusive.
pub fn grade_for(score: f64, thresholds: &GradeThresholds) -> Grade {
    if score >= thresholds.a {
        Grade::A
    } else if score >= thresholds.b {
        Grade::B
    } else if score >= thresholds.c {
        Grade::C
    } else if score >= thresholds.d {
        Grade::D
    } else {
        Grade::E
    }
}
