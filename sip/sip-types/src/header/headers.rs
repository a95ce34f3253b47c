use super::HeaderError;
use crate::header::name::Name;
use crate::header::{ConstNamed, DecodeValues, ExtendValues};
use crate::print::PrintCtx;
use bytesstr::BytesStr;
use std::fmt;
use std::mem::take;
use std::slice;

/// Storage for one or more raw header values under a single [Name].
///
/// Most headers occupy a single value, but repeated header lines or
/// comma-separated lists collapse into the `More` variant.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMore {
    One(BytesStr),
    More(Vec<BytesStr>),
}

impl OneOrMore {
    pub(crate) fn push(&mut self, value: BytesStr) {
        match self {
            OneOrMore::One(existing) => {
                let existing = take(existing);
                *self = OneOrMore::More(vec![existing, value]);
            }
            OneOrMore::More(values) => values.push(value),
        }
    }

    pub(crate) fn push_front(&mut self, value: BytesStr) {
        match self {
            OneOrMore::One(existing) => {
                let existing = take(existing);
                *self = OneOrMore::More(vec![value, existing]);
            }
            OneOrMore::More(values) => values.insert(0, value),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &BytesStr> {
        match self {
            OneOrMore::One(value) => slice::from_ref(value).iter(),
            OneOrMore::More(values) => values.iter(),
        }
    }

    fn into_vec(self) -> Vec<BytesStr> {
        match self {
            OneOrMore::One(value) => vec![value],
            OneOrMore::More(values) => values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    name: Name,
    values: OneOrMore,
}

/// Headers is a simple container for SIP-Message headers.
///
/// Internally it is a `Vec`-backed multimap to keep insertion order.
#[derive(Debug, Default, Clone)]
pub struct Headers {
    entries: Vec<Entry>,
}

impl Headers {
    /// Returns a new empty [Headers]
    #[inline]
    pub const fn new() -> Self {
        Headers {
            entries: Vec::new(),
        }
    }

    /// Returns a new empty [Headers] with the specified capacity
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Headers {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns whether any header with `name` is present
    pub fn contains(&self, name: &Name) -> bool {
        self.entries.iter().any(|entry| &entry.name == name)
    }

    /// Bypass the requirement for an [ExtendValues] implementation and insert a raw value
    #[inline]
    pub fn insert<N, V>(&mut self, name: N, value: V)
    where
        N: Into<Name>,
        V: Into<BytesStr>,
    {
        let name = name.into();

        if let Some(entry) = self.entry_mut(&name) {
            entry.values.push(value.into());
        } else {
            self.entries.push(Entry {
                name,
                values: OneOrMore::One(value.into()),
            });
        }
    }

    /// Prints `header` and stores it under its [ConstNamed] name
    #[inline]
    pub fn insert_named<H: ConstNamed + ExtendValues>(&mut self, header: &H) {
        self.insert_type(H::NAME, header);
    }

    /// Prints `header` and stores it under `name`
    #[inline]
    pub fn insert_type<H: ExtendValues>(&mut self, name: Name, header: &H) {
        let ctx = PrintCtx::default();

        if let Some(entry) = self.entry_mut(&name) {
            header.extend_values(ctx, &mut entry.values);
        } else {
            self.entries.push(Entry {
                name,
                values: header.create_values(ctx),
            });
        }
    }

    /// Prints `header` and stores it so it becomes the first value under its
    /// [ConstNamed] name, inserting a new entry at the front of the message
    /// if none existed yet. Used to push a newly created `Via` on top of a
    /// request that may already carry one from a previous hop.
    pub fn insert_named_front<H: ConstNamed + ExtendValues>(&mut self, header: &H) {
        let ctx = PrintCtx::default();

        if let Some(entry) = self.entry_mut(&H::NAME) {
            match header.create_values(ctx) {
                OneOrMore::One(value) => entry.values.push_front(value),
                OneOrMore::More(values) => {
                    for value in values.into_iter().rev() {
                        entry.values.push_front(value);
                    }
                }
            }
        } else {
            self.entries.insert(
                0,
                Entry {
                    name: H::NAME,
                    values: header.create_values(ctx),
                },
            );
        }
    }

    /// Returns a parsed header `H` stored under `name`
    #[inline]
    pub fn get<H: DecodeValues>(&self, name: Name) -> Result<H, HeaderError> {
        match self.try_get(name.clone()) {
            Some(res) => res,
            None => Err(HeaderError::missing(name)),
        }
    }

    /// Same as [Headers::get] but returns `None` if `name` is not present
    #[inline]
    pub fn try_get<H: DecodeValues>(&self, name: Name) -> Option<Result<H, HeaderError>> {
        let entry = self.entry(&name)?;

        Some(
            H::decode(&mut entry.values.iter())
                .map(|(_, header)| header)
                .map_err(|_| HeaderError::malformed_adhoc(name, "failed to parse header")),
        )
    }

    /// Returns a parsed header `H`, looked up by its [ConstNamed] name
    #[inline]
    pub fn get_named<H: ConstNamed + DecodeValues>(&self) -> Result<H, HeaderError> {
        self.get(H::NAME)
    }

    /// Same as [Headers::get_named] but returns `None` if the header is not present
    #[inline]
    pub fn try_get_named<H: ConstNamed + DecodeValues>(&self) -> Option<Result<H, HeaderError>> {
        self.try_get(H::NAME)
    }

    /// Remove all raw values stored under `name`
    pub fn remove(&mut self, name: &Name) -> Option<Vec<BytesStr>> {
        let pos = self.entries.iter().position(|entry| &entry.name == name)?;
        Some(self.entries.remove(pos).values.into_vec())
    }

    /// Parses, edits and re-inserts the header `H` stored under `name`
    pub fn edit<H, F>(&mut self, name: Name, edit: F) -> Result<(), HeaderError>
    where
        H: DecodeValues + ExtendValues,
        F: FnOnce(&mut H),
    {
        let mut header: H = self.get(name.clone())?;

        edit(&mut header);

        self.remove(&name);
        self.insert_type(name, &header);

        Ok(())
    }

    /// Clones all raw values stored under `name` into `dest`
    pub fn clone_into(&self, dest: &mut Self, name: Name) -> Result<(), HeaderError> {
        let entry = self
            .entry(&name)
            .ok_or_else(|| HeaderError::missing(name.clone()))?;

        for value in entry.values.iter() {
            dest.insert(name.clone(), value.clone());
        }

        Ok(())
    }

    /// Returns the length of the headers if printed into a buffer
    pub fn printed_len(&self) -> usize {
        let mut len = 0;

        for (name, value) in self.iter() {
            len += name.as_print_str().len();
            len += value.len();
            len += 4;
        }

        len
    }

    /// Returns an iterator over [Name] and [BytesStr] pairs in the map
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &BytesStr)> + '_ {
        self.entries
            .iter()
            .flat_map(|entry| entry.values.iter().map(move |value| (&entry.name, value)))
    }

    fn entry(&self, name: &Name) -> Option<&Entry> {
        self.entries.iter().find(|entry| &entry.name == name)
    }

    fn entry_mut(&mut self, name: &Name) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| &entry.name == name)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{}: {}\r\n", name.as_print_str(), value)?;
        }

        Ok(())
    }
}

impl Extend<(Name, BytesStr)> for Headers {
    fn extend<T: IntoIterator<Item = (Name, BytesStr)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::typed::MaxForwards;

    #[test]
    fn header_insert() {
        let mut headers = Headers::new();

        headers.insert_named(&MaxForwards(70));

        assert_eq!(headers.entries.len(), 1);
        assert_eq!(headers.entries[0].name, Name::MAX_FORWARDS);
        assert_eq!(
            headers.entries[0].values,
            OneOrMore::One(BytesStr::from_static("70"))
        );
    }

    #[test]
    fn header_insert_twice() {
        let mut headers = Headers::new();

        headers.insert_named(&MaxForwards(70));
        headers.insert_named(&MaxForwards(70));

        assert_eq!(headers.entries.len(), 1);
        assert_eq!(headers.entries[0].name, Name::MAX_FORWARDS);
        assert_eq!(
            headers.entries[0].values,
            OneOrMore::One(BytesStr::from_static("70"))
        );
    }

    #[test]
    fn header_insert_raw() {
        let mut headers = Headers::new();

        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));

        assert_eq!(headers.entries.len(), 1);
        assert_eq!(headers.entries[0].name, Name::MAX_FORWARDS);
        assert_eq!(
            headers.entries[0].values,
            OneOrMore::One(BytesStr::from_static("70"))
        );
    }

    #[test]
    fn header_insert_raw_twice() {
        let mut headers = Headers::new();

        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));
        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));

        assert_eq!(headers.entries.len(), 1);
        assert_eq!(headers.entries[0].name, Name::MAX_FORWARDS);
        assert_eq!(
            headers.entries[0].values,
            OneOrMore::More(vec![
                BytesStr::from_static("70"),
                BytesStr::from_static("70")
            ])
        );
    }

    #[test]
    fn header_remove() {
        let mut headers = Headers::new();
        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));

        assert_eq!(headers.remove(&Name::MAX_FORWARDS).unwrap().len(), 1);

        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));
        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));
        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));

        assert_eq!(headers.remove(&Name::MAX_FORWARDS).unwrap().len(), 3);
    }

    #[test]
    fn header_get_named() {
        let mut headers = Headers::new();
        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));

        let max_fwd: MaxForwards = headers.get_named().unwrap();

        assert_eq!(headers.entries.len(), 1);
        assert_eq!(max_fwd.0, 70);
    }

    #[test]
    fn header_edit() {
        let mut headers = Headers::new();
        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));

        headers
            .edit(Name::MAX_FORWARDS, |max_fwd: &mut MaxForwards| {
                max_fwd.0 = 120
            })
            .unwrap();

        assert_eq!(headers.entries.len(), 1);
        assert_eq!(
            headers.entries[0].values,
            OneOrMore::One(BytesStr::from_static("120"))
        );
    }

    #[test]
    fn header_clone_into() {
        let mut headers1 = Headers::new();
        headers1.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));

        let mut headers2 = Headers::new();
        headers2.insert(Name::MAX_FORWARDS, BytesStr::from_static("80"));

        headers1
            .clone_into(&mut headers2, Name::MAX_FORWARDS)
            .unwrap();

        assert_eq!(headers1.entries.len(), 1);
        assert_eq!(headers2.entries.len(), 1);

        assert_eq!(
            headers2.entries[0].values,
            OneOrMore::More(vec![
                BytesStr::from_static("80"),
                BytesStr::from_static("70")
            ])
        )
    }

    #[test]
    fn header_iter() {
        let mut headers = Headers::new();
        headers.insert(Name::MAX_FORWARDS, BytesStr::from_static("70"));

        headers.insert(
            Name::VIA,
            BytesStr::from_static("SIP/2.0/UDP 192.168.123.222;branch=123abc"),
        );

        headers.insert(Name::CALL_ID, BytesStr::from_static("abc123"));

        headers.insert(
            Name::VIA,
            BytesStr::from_static("SIP/2.0/UDP 192.168.123.223;branch=1234ab"),
        );

        let mut iter = headers.iter();

        let (name, value) = iter.next().unwrap();
        assert_eq!(name, &Name::MAX_FORWARDS);
        assert_eq!(value, "70");

        let (name, value) = iter.next().unwrap();
        assert_eq!(name, &Name::VIA);
        assert_eq!(value, "SIP/2.0/UDP 192.168.123.222;branch=123abc");

        let (name, value) = iter.next().unwrap();
        assert_eq!(name, &Name::VIA);
        assert_eq!(value, "SIP/2.0/UDP 192.168.123.223;branch=1234ab");

        let (name, value) = iter.next().unwrap();
        assert_eq!(name, &Name::CALL_ID);
        assert_eq!(value, "abc123");

        assert!(iter.next().is_none());
    }
}
