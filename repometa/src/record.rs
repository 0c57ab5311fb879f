// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Output data model: per-repository records and the corpus document.
//!
//! Records are built once per run and serialized in camelCase to match the
//! document consumed by the site generator. Two value types carry wire
//! conventions of their own: [`LatestVersion`] encodes "no release" as a
//! literal `false`, and [`DisplayDate`] renders as `D Mon YYYY`.

use std::fmt;

use chrono::NaiveDate;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
};

/// Language reported when a repository has no measurable language mix.
pub const OTHER_LANGUAGE: &str = "Other";

const DISPLAY_DATE_FORMAT: &str = "%-d %b %Y";

/// Normalized metadata record describing a single repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord
{
    pub name:              String,
    pub owner:             Owner,
    pub html_url:          String,
    pub description:       String,
    pub homepage:          Option<String,>,
    pub topics:            Vec<String,>,
    pub created_at:        DisplayDate,
    pub updated_at:        DisplayDate,
    /// Significant lines after language exclusions.
    pub loc:               u64,
    pub languages_meta:    LanguageShares,
    /// Dominant language, or [`OTHER_LANGUAGE`].
    pub language:          String,
    pub open_issues_count: u64,
    pub download_count:    u64,
    pub latest_version:    LatestVersion,
    pub license:           License,
}

/// Owning account of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct Owner
{
    pub login: String,
}

/// License attached to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct License
{
    pub name:    String,
    pub spdx_id: String,
}

impl License
{
    /// Builds a license whose display name equals its SPDX identifier, as
    /// package descriptors only carry the identifier.
    pub fn from_spdx(identifier: &str,) -> Self
    {
        Self {
            name: identifier.to_owned(), spdx_id: identifier.to_owned(),
        }
    }
}

/// Latest published version of a repository.
///
/// Serializes as the version string, or as `false` when nothing was found.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum LatestVersion
{
    /// A release tag or descriptor version.
    Tag(String,),
    /// No release, tag, or descriptor version could be resolved.
    Missing,
}

impl Serialize for LatestVersion
{
    fn serialize<S,>(&self, serializer: S,) -> Result<S::Ok, S::Error,>
    where
        S: Serializer,
    {
        match self {
            Self::Tag(tag,) => serializer.serialize_str(tag,),
            Self::Missing => serializer.serialize_bool(false,),
        }
    }
}

impl<'de,> Deserialize<'de,> for LatestVersion
{
    fn deserialize<D,>(deserializer: D,) -> Result<Self, D::Error,>
    where
        D: Deserializer<'de,>,
    {
        #[derive(Deserialize,)]
        #[serde(untagged)]
        enum Raw
        {
            Tag(String,),
            Flag(bool,),
        }

        match Raw::deserialize(deserializer,)? {
            Raw::Tag(tag,) => Ok(Self::Tag(tag,),),
            Raw::Flag(false,) => Ok(Self::Missing,),
            Raw::Flag(true,) => Err(de::Error::custom("latestVersion cannot be `true`",),),
        }
    }
}

/// Calendar day rendered as `D Mon YYYY`, e.g. `5 Mar 2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,)]
pub struct DisplayDate(pub NaiveDate,);

impl DisplayDate
{
    /// Parses a `YYYY-MM-DD` day as printed by `git log --date=short`.
    pub fn parse_short(value: &str,) -> Option<Self,>
    {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d",).ok().map(Self,)
    }

    /// Parses an RFC 3339 timestamp and keeps its UTC calendar day.
    pub fn parse_rfc3339(value: &str,) -> Option<Self,>
    {
        chrono::DateTime::parse_from_rfc3339(value.trim(),)
            .ok()
            .map(|timestamp| Self(timestamp.with_timezone(&chrono::Utc,).date_naive(),),)
    }
}

impl fmt::Display for DisplayDate
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        write!(f, "{}", self.0.format(DISPLAY_DATE_FORMAT))
    }
}

impl Serialize for DisplayDate
{
    fn serialize<S,>(&self, serializer: S,) -> Result<S::Ok, S::Error,>
    where
        S: Serializer,
    {
        serializer.collect_str(self,)
    }
}

impl<'de,> Deserialize<'de,> for DisplayDate
{
    fn deserialize<D,>(deserializer: D,) -> Result<Self, D::Error,>
    where
        D: Deserializer<'de,>,
    {
        let raw = String::deserialize(deserializer,)?;
        NaiveDate::parse_from_str(&raw, "%d %b %Y",)
            .map(Self,)
            .map_err(|error| de::Error::custom(format!("invalid date '{raw}': {error}"),),)
    }
}

/// Language → percent mapping that preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct LanguageShares(Vec<(String, u32,),>,);

impl LanguageShares
{
    /// Appends a language share, replacing an earlier entry with the same
    /// key in place.
    pub fn insert(&mut self, language: impl Into<String,>, percent: u32,)
    {
        let language = language.into();
        match self.0.iter_mut().find(|(key, _,)| *key == language,) {
            Some(entry,) => entry.1 = percent,
            None => self.0.push((language, percent,),),
        }
    }

    pub fn get(&self, language: &str,) -> Option<u32,>
    {
        self.0.iter().find(|(key, _,)| key == language,).map(|(_, percent,)| *percent,)
    }

    pub fn is_empty(&self,) -> bool
    {
        self.0.is_empty()
    }

    pub fn len(&self,) -> usize
    {
        self.0.len()
    }

    pub fn iter(&self,) -> impl Iterator<Item = (&str, u32,),>
    {
        self.0.iter().map(|(key, percent,)| (key.as_str(), *percent,),)
    }

    /// Key with the highest percent; the first key wins ties.
    pub fn dominant(&self,) -> Option<&str,>
    {
        let mut best: Option<(&str, u32,),> = None;
        for (language, percent,) in self.iter() {
            match best {
                Some((_, top,),) if percent <= top => {}
                _ => best = Some((language, percent,),),
            }
        }
        best.map(|(language, _,)| language,)
    }
}

impl FromIterator<(String, u32,),> for LanguageShares
{
    fn from_iter<I: IntoIterator<Item = (String, u32,),>,>(iter: I,) -> Self
    {
        let mut shares = Self::default();
        for (language, percent,) in iter {
            shares.insert(language, percent,);
        }
        shares
    }
}

impl Serialize for LanguageShares
{
    fn serialize<S,>(&self, serializer: S,) -> Result<S::Ok, S::Error,>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len(),),)?;
        for (language, percent,) in &self.0 {
            map.serialize_entry(language, percent,)?;
        }
        map.end()
    }
}

impl<'de,> Deserialize<'de,> for LanguageShares
{
    fn deserialize<D,>(deserializer: D,) -> Result<Self, D::Error,>
    where
        D: Deserializer<'de,>,
    {
        deserializer
            .deserialize_map(OrderedEntries::<u32,>::new(),)
            .map(|entries| entries.into_iter().collect(),)
    }
}

/// Records grouped by dominant language, keys in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct LanguageGroups(Vec<(String, Vec<RepositoryRecord,>,),>,);

impl LanguageGroups
{
    /// Groups records by their `language`, skipping empty keys.
    ///
    /// Group order follows the first appearance of each language; records
    /// keep their relative order inside a group.
    pub fn from_records<'a,>(records: impl IntoIterator<Item = &'a RepositoryRecord,>,) -> Self
    {
        let mut groups: Vec<(String, Vec<RepositoryRecord,>,),> = Vec::new();
        for record in records {
            if record.language.is_empty() {
                continue;
            }
            match groups.iter_mut().find(|(language, _,)| *language == record.language,) {
                Some((_, members,),) => members.push(record.clone(),),
                None => groups.push((record.language.clone(), vec![record.clone()],),),
            }
        }
        Self(groups,)
    }

    pub fn languages(&self,) -> impl Iterator<Item = &str,>
    {
        self.0.iter().map(|(language, _,)| language.as_str(),)
    }

    pub fn get(&self, language: &str,) -> Option<&[RepositoryRecord],>
    {
        self.0
            .iter()
            .find(|(key, _,)| key == language,)
            .map(|(_, records,)| records.as_slice(),)
    }

    /// Iterates over every grouped record in group order.
    pub fn records(&self,) -> impl Iterator<Item = &RepositoryRecord,>
    {
        self.0.iter().flat_map(|(_, records,)| records.iter(),)
    }

    pub fn len(&self,) -> usize
    {
        self.0.len()
    }

    pub fn is_empty(&self,) -> bool
    {
        self.0.is_empty()
    }
}

impl Serialize for LanguageGroups
{
    fn serialize<S,>(&self, serializer: S,) -> Result<S::Ok, S::Error,>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len(),),)?;
        for (language, records,) in &self.0 {
            map.serialize_entry(language, records,)?;
        }
        map.end()
    }
}

impl<'de,> Deserialize<'de,> for LanguageGroups
{
    fn deserialize<D,>(deserializer: D,) -> Result<Self, D::Error,>
    where
        D: Deserializer<'de,>,
    {
        deserializer.deserialize_map(OrderedEntries::<Vec<RepositoryRecord,>,>::new(),).map(Self,)
    }
}

/// Visitor collecting map entries in document order.
struct OrderedEntries<V,>(std::marker::PhantomData<V,>,);

impl<V,> OrderedEntries<V,>
{
    fn new() -> Self
    {
        Self(std::marker::PhantomData,)
    }
}

impl<'de, V,> Visitor<'de,> for OrderedEntries<V,>
where
    V: Deserialize<'de,>,
{
    type Value = Vec<(String, V,),>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        formatter.write_str("a map keyed by language",)
    }

    fn visit_map<A,>(self, mut access: A,) -> Result<Self::Value, A::Error,>
    where
        A: MapAccess<'de,>,
    {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0,),);
        while let Some((key, value,),) = access.next_entry::<String, V,>()? {
            entries.push((key, value,),);
        }
        Ok(entries,)
    }
}

/// Corpus-level document written to the output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(rename_all = "camelCase")]
pub struct CorpusResult
{
    pub projects:                LanguageGroups,
    /// `records + ignore list − don't-count list`; may be negative when the
    /// don't-count list outgrows the corpus.
    pub total_projects:          i64,
    pub total_commits:           u64,
    pub overall_download_counts: u64,
}
