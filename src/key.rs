use std::str::FromStr;

/// Opaque course identifier of the form `<prefix>:<org>+<course>+<session>`,
/// e.g. `course-v1:FUN+00101+session01`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseKey {
    raw: String,
    org: String,
    course: String,
    session: String,
}

impl CourseKey {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn session(&self) -> &str {
        &self.session
    }
}

impl FromStr for CourseKey {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let Some((_prefix, rest)) = raw.split_once(':') else {
            anyhow::bail!("course key must contain a ':' prefix: {raw}");
        };

        let mut parts = rest.split('+');
        let (Some(org), Some(course), Some(session), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            anyhow::bail!("course key must have exactly three '+'-separated components: {raw}");
        };

        if org.is_empty() || course.is_empty() || session.is_empty() {
            anyhow::bail!("course key has an empty component: {raw}");
        }

        Ok(Self {
            raw: raw.to_owned(),
            org: org.to_owned(),
            course: course.to_owned(),
            session: session.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_key() -> anyhow::Result<()> {
        let key: CourseKey = "course-v1:FUN+00101+session01".parse()?;
        assert_eq!(key.org(), "FUN");
        assert_eq!(key.course(), "00101");
        assert_eq!(key.session(), "session01");
        assert_eq!(key.as_str(), "course-v1:FUN+00101+session01");
        Ok(())
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!("FUN+00101+session01".parse::<CourseKey>().is_err());
    }

    #[test]
    fn rejects_wrong_component_count() {
        assert!("course-v1:FUN+00101".parse::<CourseKey>().is_err());
        assert!("course-v1:FUN+00101+a+b".parse::<CourseKey>().is_err());
    }

    #[test]
    fn rejects_empty_component() {
        assert!("course-v1:FUN++session01".parse::<CourseKey>().is_err());
    }
}
