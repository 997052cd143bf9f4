use crate::parser;

/// The property parameters the decoders look at.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// Purpose: To specify the common name to be associated with the calendar
    /// user specified by the property.
    ///
    /// Description:  This parameter can be specified on properties with a
    /// CAL-ADDRESS value type.  The parameter value can be used for display
    /// text to be associated with the calendar address specified by the
    /// property.
    CN(String),

    /// Purpose: To identify the type of calendar user specified by the property.
    ///
    /// Description:  If not specified on a property that allows this
    /// parameter, the default is INDIVIDUAL. We do not fill in the default,
    /// an absent parameter stays absent.
    UserType(String),

    /// Purpose: To specify the language for text values in a property or
    /// property parameter.
    Language(String),

    /// Purpose: To specify the participation status for the calendar user
    /// specified by the property.
    ///
    /// Description: The parameter values differ depending on whether they are
    /// associated with a group-scheduled "VEVENT", "VTODO", or "VJOURNAL".
    /// Values are kept verbatim.
    ParticipationStatus(String),

    /// Purpose: To specify the participation role for the calendar user
    /// specified by the property.
    ParticipationRole(String),

    /// Purpose: To specify the identifier for the time zone definition for a
    /// time component in the property value.
    ///
    /// Description: The identifier is only carried alongside the decoded
    /// instant, it is never used to shift the instant itself.
    TimeZoneID(String),

    /// Purpose:  To explicitly specify the value type format for a property
    /// value, e.g. `DATE` for whole-day dates.
    ValueDataType(String),

    /// Any parameter that wasn't recognized.
    Other { name: String, values: Vec<String> },
}

impl From<parser::Parameter> for Parameter {
    fn from(p: parser::Parameter) -> Self {
        let name = p.name.to_ascii_uppercase();
        // The grammar guarantees at least one value.
        let value = p.values.last().cloned().unwrap_or_default();

        match &name as &str {
            // An unquoted display name such as `Doe, Jane` arrives split.
            "CN" => Parameter::CN(p.values.join(",")),
            "CUTYPE" => Parameter::UserType(value),
            "LANGUAGE" => Parameter::Language(value),
            "PARTSTAT" => Parameter::ParticipationStatus(value),
            "ROLE" => Parameter::ParticipationRole(value),
            "TZID" => Parameter::TimeZoneID(value),
            "VALUE" => Parameter::ValueDataType(value),
            _ => Parameter::Other {
                name,
                values: p.values,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
}

impl<I> From<I> for ParameterSet
where
    I: IntoIterator<Item = parser::Parameter>,
{
    fn from(iter: I) -> Self {
        ParameterSet {
            parameters: iter.into_iter().map(Parameter::from).collect(),
        }
    }
}

impl ParameterSet {
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get_value_data_type(&self) -> Option<&str> {
        for param in &self.parameters {
            if let Parameter::ValueDataType(data_type) = param {
                return Some(data_type);
            }
        }

        None
    }

    pub fn get_tzid(&self) -> Option<&str> {
        for param in &self.parameters {
            if let Parameter::TimeZoneID(tzid) = param {
                return Some(tzid);
            }
        }

        None
    }

    pub fn get_common_name(&self) -> Option<&str> {
        for param in &self.parameters {
            if let Parameter::CN(name) = param {
                return Some(name);
            }
        }

        None
    }

    pub fn get_role(&self) -> Option<&str> {
        for param in &self.parameters {
            if let Parameter::ParticipationRole(role) = param {
                return Some(role);
            }
        }

        None
    }

    pub fn get_participation_status(&self) -> Option<&str> {
        for param in &self.parameters {
            if let Parameter::ParticipationStatus(status) = param {
                return Some(status);
            }
        }

        None
    }

    pub fn get_user_type(&self) -> Option<&str> {
        for param in &self.parameters {
            if let Parameter::UserType(user_type) = param {
                return Some(user_type);
            }
        }

        None
    }

    /// Whether the value is a plain `DATE` rather than a `DATE-TIME`.
    pub fn is_date_value(&self) -> bool {
        self.get_value_data_type()
            .map_or(false, |t| t.eq_ignore_ascii_case("DATE"))
    }
}
