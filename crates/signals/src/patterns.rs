use serde::{Deserialize, Serialize};

/// What a field asks for, independent of how the caller's profile names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Email,
    Phone,
    FirstName,
    MiddleName,
    LastName,
    FullName,
    Company,
    JobTitle,
    AddressLine1,
    AddressLine2,
    City,
    State,
    PostalCode,
    Country,
    DateOfBirth,
    Website,
    Linkedin,
    Github,
    Username,
}

pub(crate) struct PurposePattern {
    pub purpose: Purpose,
    /// Phrases looked for on every channel.
    pub keywords: &'static [&'static str],
    /// A channel containing any of these tokens never counts for the purpose.
    pub excludes: &'static [&'static str],
    /// HTML autocomplete tokens that name the purpose outright.
    pub autocomplete: &'static [&'static str],
    /// Common profile key spellings, compared after normalization.
    pub aliases: &'static [&'static str],
}

// Order is the tie-break order of the scorer.
pub(crate) static PATTERNS: &[PurposePattern] = &[
    PurposePattern {
        purpose: Purpose::Email,
        keywords: &["email", "e mail", "email address", "mail"],
        excludes: &[],
        autocomplete: &["email"],
        aliases: &["email", "emailAddress", "e_mail", "mail"],
    },
    PurposePattern {
        purpose: Purpose::Phone,
        keywords: &[
            "phone",
            "telephone",
            "tel",
            "mobile",
            "cell",
            "phone number",
            "contact number",
        ],
        excludes: &[],
        autocomplete: &["tel", "tel-national", "tel-local"],
        aliases: &["phone", "phoneNumber", "telephone", "mobile", "cell", "tel"],
    },
    PurposePattern {
        purpose: Purpose::FirstName,
        keywords: &["first name", "given name", "firstname", "fname", "forename"],
        excludes: &[],
        autocomplete: &["given-name"],
        aliases: &["firstName", "givenName", "fname"],
    },
    PurposePattern {
        purpose: Purpose::MiddleName,
        keywords: &["middle name", "middle initial", "mname"],
        excludes: &[],
        autocomplete: &["additional-name"],
        aliases: &["middleName", "middleInitial"],
    },
    PurposePattern {
        purpose: Purpose::LastName,
        keywords: &["last name", "surname", "family name", "lname", "lastname"],
        excludes: &[],
        autocomplete: &["family-name"],
        aliases: &["lastName", "surname", "familyName", "lname"],
    },
    PurposePattern {
        purpose: Purpose::FullName,
        keywords: &["full name", "name", "your name"],
        excludes: &[
            "first",
            "last",
            "middle",
            "company",
            "user",
            "file",
            "business",
            "organization",
            "account",
            "display",
            "given",
            "family",
        ],
        autocomplete: &["name"],
        aliases: &["fullName", "name"],
    },
    PurposePattern {
        purpose: Purpose::Company,
        keywords: &[
            "company",
            "company name",
            "organization",
            "organisation",
            "employer",
            "business name",
        ],
        excludes: &[],
        autocomplete: &["organization"],
        aliases: &["company", "companyName", "organization", "employer"],
    },
    PurposePattern {
        purpose: Purpose::JobTitle,
        keywords: &["job title", "position", "occupation", "designation", "role"],
        excludes: &[],
        autocomplete: &["organization-title"],
        aliases: &["jobTitle", "title", "position", "role"],
    },
    PurposePattern {
        purpose: Purpose::AddressLine1,
        keywords: &[
            "address",
            "street",
            "street address",
            "address line 1",
            "address 1",
            "addr",
        ],
        excludes: &["email", "mail", "2", "ip", "web"],
        autocomplete: &["address-line1", "street-address"],
        aliases: &["address", "addressLine1", "street", "streetAddress", "address1"],
    },
    PurposePattern {
        purpose: Purpose::AddressLine2,
        keywords: &[
            "address line 2",
            "address 2",
            "apartment",
            "suite",
            "apt",
            "unit",
        ],
        excludes: &[],
        autocomplete: &["address-line2"],
        aliases: &["addressLine2", "address2", "apartment", "suite", "apt"],
    },
    PurposePattern {
        purpose: Purpose::City,
        keywords: &["city", "town", "locality"],
        excludes: &[],
        autocomplete: &["address-level2"],
        aliases: &["city", "town"],
    },
    PurposePattern {
        purpose: Purpose::State,
        keywords: &["state", "province", "region", "county"],
        excludes: &["united"],
        autocomplete: &["address-level1"],
        aliases: &["state", "province", "region"],
    },
    PurposePattern {
        purpose: Purpose::PostalCode,
        keywords: &["zip", "zip code", "postal code", "postcode", "postal"],
        excludes: &[],
        autocomplete: &["postal-code"],
        aliases: &["zip", "zipCode", "postalCode", "postcode"],
    },
    PurposePattern {
        purpose: Purpose::Country,
        keywords: &["country", "nation"],
        excludes: &[],
        autocomplete: &["country", "country-name"],
        aliases: &["country"],
    },
    PurposePattern {
        purpose: Purpose::DateOfBirth,
        keywords: &["date of birth", "birth date", "birthday", "dob", "birthdate"],
        excludes: &[],
        autocomplete: &["bday"],
        aliases: &["dateOfBirth", "dob", "birthDate", "birthday"],
    },
    PurposePattern {
        purpose: Purpose::Website,
        keywords: &["website", "web site", "url", "homepage", "portfolio"],
        excludes: &["linkedin", "github"],
        autocomplete: &["url"],
        aliases: &["website", "url", "homepage", "portfolio"],
    },
    PurposePattern {
        purpose: Purpose::Linkedin,
        keywords: &["linkedin", "linked in", "linkedin profile"],
        excludes: &[],
        autocomplete: &[],
        aliases: &["linkedin", "linkedinUrl", "linkedinProfile"],
    },
    PurposePattern {
        purpose: Purpose::Github,
        keywords: &["github", "git hub"],
        excludes: &[],
        autocomplete: &[],
        aliases: &["github", "githubUrl"],
    },
    PurposePattern {
        purpose: Purpose::Username,
        keywords: &["username", "user name", "login", "handle", "user id"],
        excludes: &[],
        autocomplete: &["username"],
        aliases: &["username", "login", "handle"],
    },
];

impl Purpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::FirstName => "first_name",
            Self::MiddleName => "middle_name",
            Self::LastName => "last_name",
            Self::FullName => "full_name",
            Self::Company => "company",
            Self::JobTitle => "job_title",
            Self::AddressLine1 => "address_line1",
            Self::AddressLine2 => "address_line2",
            Self::City => "city",
            Self::State => "state",
            Self::PostalCode => "postal_code",
            Self::Country => "country",
            Self::DateOfBirth => "date_of_birth",
            Self::Website => "website",
            Self::Linkedin => "linkedin",
            Self::Github => "github",
            Self::Username => "username",
        }
    }

    pub fn all() -> impl Iterator<Item = Purpose> {
        PATTERNS.iter().map(|p| p.purpose)
    }

    pub fn aliases(self) -> &'static [&'static str] {
        self.pattern().aliases
    }

    pub(crate) fn pattern(self) -> &'static PurposePattern {
        // PATTERNS lists every variant exactly once, in declaration order.
        &PATTERNS[self as usize]
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
