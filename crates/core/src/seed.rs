//! Demo records for an empty register.

use crate::error::CaseworkResult;
use crate::patient::{PatientDraft, PatientStatus, WiscScores};

/// A handful of representative cases covering every status.
pub fn demo_drafts() -> CaseworkResult<Vec<PatientDraft>> {
    let mut lidia = PatientDraft::new("Blazquez Martinez, Lidia", "2012-08-04", "Rasgos TEA")?;
    lidia.status = PatientStatus::Discharged;
    lidia.school = Some("IES Joan Maria Thomas".into());
    lidia.health_centre = Some("IBSMIA".into());
    lidia.referral = Some("IBSMIA".into());
    lidia.school_protocol = true;
    lidia.scores.nice = Some(17);
    lidia.scores.wisc = WiscScores {
        icv: Some(89),
        ive: Some(94),
        imt: Some(88),
        ivp: Some(69),
        cit: Some(79),
    };

    let mut marc = PatientDraft::new("Garcia Lopez, Marc", "2015-01-20", "TDAH")?;
    marc.status = PatientStatus::FollowUp;
    marc.school = Some("CEIP Son Serra".into());
    marc.health_centre = Some("CS Son Pisa".into());
    marc.referral = Some("Pediatria AP".into());
    marc.scores.nice = Some(14);
    marc.scores.amse = Some(85);
    marc.scores.scq = Some(22);

    let mut sofia = PatientDraft::new("Ferrer Pons, Sofia", "2017-11-02", "TEA grado 1")?;
    sofia.school = Some("CEIP Es Pont".into());
    sofia.health_centre = Some("CS Camp Redo".into());

    Ok(vec![lidia, marc, sofia])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_drafts_cover_every_status() {
        let drafts = demo_drafts().unwrap();
        for status in PatientStatus::ALL {
            assert!(drafts.iter().any(|d| d.status == status), "missing {status}");
        }
    }
}
