//! Outlook item (.msg) field extraction on top of the compound file.
//! https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxmsg

use std::path::Path;

use derivative::Derivative;
use log::debug;
use serde::Serialize;

use crate::config::ParserConfig;
use crate::constants;
use crate::directory::DirectoryEntry;
use crate::error::OleError;
use crate::property::{
    decode_property_stream, tags, PropertyBag, PropertyCounters, PropertyStreamKind,
    PropertyValue,
};
use crate::stream::StreamEncoding;
use crate::{OleFile, Readable};

/// What a storage represents, judged by its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Attachment,
    Recipient,
    /// an attached message, flagged but not decoded
    EmbeddedMessage,
    /// anything else, its contents are merged into the enclosing bag
    Other,
}

impl StorageKind {
    pub fn from_name(name: &str) -> Self {
        if name.starts_with(constants::ATTACHMENT_STORAGE_PREFIX) {
            StorageKind::Attachment
        } else if name.starts_with(constants::RECIPIENT_STORAGE_PREFIX) {
            StorageKind::Recipient
        } else if name.starts_with(constants::SUBSTORAGE_PREFIX)
            && name
                .to_ascii_uppercase()
                .ends_with(constants::STORAGE_TYPE_OBJECT)
        {
            StorageKind::EmbeddedMessage
        } else {
            StorageKind::Other
        }
    }
}

/// Tag and storage type from the eight hex digits after `__substg1.0_`. Multi-valued
/// streams carry a trailing `-XXXXXXXX` index, which is ignored.
fn split_stream_name(name: &str) -> Option<(String, String)> {
    let code = name
        .strip_prefix(constants::SUBSTORAGE_PREFIX)?
        .get(constants::SUBSTORAGE_CODE_OFFSET..constants::SUBSTORAGE_CODE_OFFSET + 8)?;
    if !code.chars().all(|character| character.is_ascii_hexdigit()) {
        return None;
    }
    let (tag, type_code) = code.split_at(4);
    Some((tag.to_ascii_uppercase(), type_code.to_ascii_uppercase()))
}

/// The extracted properties of a message.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MessageFields {
    pub fields: PropertyBag,
    pub attachments: Vec<PropertyBag>,
    pub recipients: Vec<PropertyBag>,
}

impl MessageFields {
    pub fn subject(&self) -> Option<&str> {
        self.fields.get_str("Subject")
    }

    pub fn sender_name(&self) -> Option<&str> {
        self.fields.get_str("SenderName")
    }

    pub fn body(&self) -> Option<&str> {
        self.fields.get_str("Body")
    }

    pub fn attachments(&self) -> &[PropertyBag] {
        &self.attachments
    }

    pub fn recipients(&self) -> &[PropertyBag] {
        &self.recipients
    }

    /// The root `_properties` bag, when the message has a property stream.
    pub fn properties(&self) -> Option<&PropertyBag> {
        self.fields
            .get(constants::KEY_PROPERTIES)
            .and_then(PropertyValue::as_bag)
    }

    pub fn is_embedded_message_present(&self) -> bool {
        std::iter::once(&self.fields)
            .chain(self.attachments.iter())
            .any(|bag| bag.contains_key(constants::KEY_EMBEDDED_MESSAGE))
    }

    /// One bag holding the message fields plus `attachments` and `recipients` lists.
    pub fn to_bag(&self) -> PropertyBag {
        let mut bag = self.fields.clone();
        bag.insert(
            constants::KEY_ATTACHMENTS,
            PropertyValue::BagList(self.attachments.clone()),
        );
        bag.insert(
            constants::KEY_RECIPIENTS,
            PropertyValue::BagList(self.recipients.clone()),
        );
        bag
    }
}

/// A parsed .msg file: the container plus the fields extracted from it.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Message {
    #[derivative(Debug = "ignore")]
    ole_file: OleFile,
    fields: MessageFields,
    counters: Option<PropertyCounters>,
}

impl Message {
    pub fn parse(data: Vec<u8>) -> Result<Self, OleError> {
        Self::parse_with_config(data, &ParserConfig::default())
    }

    pub fn parse_with_config(data: Vec<u8>, config: &ParserConfig) -> Result<Self, OleError> {
        let ole_file = OleFile::parse_with_config(data, config)?;
        Self::from_ole_file(ole_file, config)
    }

    pub fn from_ole_file(ole_file: OleFile, config: &ParserConfig) -> Result<Self, OleError> {
        let mut extractor = FieldExtractor {
            ole_file: &ole_file,
            config,
            attachments: vec![],
            recipients: vec![],
            counters: None,
        };
        let mut fields = PropertyBag::new();
        extractor.walk(0, 0, StorageKind::Other, &mut fields)?;

        let FieldExtractor {
            attachments,
            recipients,
            counters,
            ..
        } = extractor;
        debug!(
            "[msg] extracted {} fields, {} attachments, {} recipients",
            fields.len(),
            attachments.len(),
            recipients.len()
        );

        Ok(Message {
            fields: MessageFields {
                fields,
                attachments,
                recipients,
            },
            counters,
            ole_file,
        })
    }

    pub async fn from_reader<R>(read: R, config: &ParserConfig) -> Result<Self, OleError>
    where
        R: Readable,
    {
        let ole_file = OleFile::from_reader(read, config).await?;
        Self::from_ole_file(ole_file, config)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, OleError> {
        let file = tokio::fs::File::open(path).await?;
        Self::from_reader(file, &ParserConfig::default()).await
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn into_fields(self) -> MessageFields {
        self.fields
    }

    pub fn ole_file(&self) -> &OleFile {
        &self.ole_file
    }

    /// Counters from the root property stream header.
    pub fn property_header(&self) -> Option<&PropertyCounters> {
        self.counters.as_ref()
    }

    /// Loads the payload an attachment bag points at through its `dataId`.
    pub fn attachment_content(&self, attachment: &PropertyBag) -> Result<Vec<u8>, OleError> {
        let data_id = attachment
            .get(constants::KEY_DATA_ID)
            .and_then(PropertyValue::as_i64)
            .ok_or(OleError::DirectoryEntryNotFound)?;
        let data_id = usize::try_from(data_id).map_err(|_| OleError::DirectoryEntryNotFound)?;
        self.attachment_content_by_id(data_id)
    }

    pub fn attachment_content_by_id(&self, data_id: usize) -> Result<Vec<u8>, OleError> {
        match self.ole_file.entry(data_id) {
            Some(entry) if entry.is_stream() => Ok(self.ole_file.read_entry_data(entry)),
            Some(_) => Err(OleError::NotAStream(data_id)),
            None => Err(OleError::DirectoryEntryNotFound),
        }
    }
}

struct FieldExtractor<'a> {
    ole_file: &'a OleFile,
    config: &'a ParserConfig,
    attachments: Vec<PropertyBag>,
    recipients: Vec<PropertyBag>,
    counters: Option<PropertyCounters>,
}

impl FieldExtractor<'_> {
    /// Visits the children of `storage_index`, writing into `target`. `scope_root` is the
    /// storage that owns `target` (root, an attachment or a recipient).
    fn walk(
        &mut self,
        storage_index: usize,
        scope_root: usize,
        scope: StorageKind,
        target: &mut PropertyBag,
    ) -> Result<(), OleError> {
        let ole_file = self.ole_file;
        for entry in ole_file.children(storage_index) {
            if entry.is_storage() {
                self.visit_storage(entry, scope_root, scope, target)?;
            } else if entry.name() == constants::PROPERTIES_STREAM_NAME {
                if storage_index == scope_root {
                    self.visit_property_stream(entry, scope, target)?;
                }
            } else if entry.name().starts_with(constants::SUBSTORAGE_PREFIX) {
                self.visit_named_stream(entry, target);
            }
        }
        Ok(())
    }

    fn visit_storage(
        &mut self,
        entry: &DirectoryEntry,
        scope_root: usize,
        scope: StorageKind,
        target: &mut PropertyBag,
    ) -> Result<(), OleError> {
        let kind = StorageKind::from_name(entry.name());
        match kind {
            StorageKind::Attachment | StorageKind::Recipient => {
                let mut bag = PropertyBag::new();
                self.walk(entry.index(), entry.index(), kind, &mut bag)?;
                if kind == StorageKind::Attachment {
                    self.attachments.push(bag);
                } else {
                    self.recipients.push(bag);
                }
            }
            StorageKind::EmbeddedMessage => {
                debug!(
                    "[msg] embedded message in storage {} is not decoded",
                    entry.name()
                );
                target.insert(constants::KEY_EMBEDDED_MESSAGE, PropertyValue::Bool(true));
            }
            StorageKind::Other => self.walk(entry.index(), scope_root, scope, target)?,
        }
        Ok(())
    }

    fn visit_property_stream(
        &mut self,
        entry: &DirectoryEntry,
        scope: StorageKind,
        target: &mut PropertyBag,
    ) -> Result<(), OleError> {
        let kind = match scope {
            StorageKind::Attachment | StorageKind::Recipient
                if self.config.decode_sub_object_properties =>
            {
                PropertyStreamKind::SubObject
            }
            StorageKind::Attachment | StorageKind::Recipient => return Ok(()),
            _ => PropertyStreamKind::TopLevel,
        };
        let data = self.ole_file.read_entry_data(entry);
        let stream = decode_property_stream(&data, kind)?;
        if kind == PropertyStreamKind::TopLevel {
            self.counters = stream.counters;
        }
        target.insert(
            constants::KEY_PROPERTIES,
            PropertyValue::Bag(stream.to_bag()),
        );
        Ok(())
    }

    fn visit_named_stream(&mut self, entry: &DirectoryEntry, target: &mut PropertyBag) {
        let Some((tag, type_code)) = split_stream_name(entry.name()) else {
            debug!("[msg] stream {} has no tag code", entry.name());
            return;
        };
        let field_name = match tags::lookup(&tag) {
            Some(name) => name.to_string(),
            None => format!("_{}", tag),
        };

        if tag == constants::ATTACHMENT_DATA_TAG {
            // fetched on demand through Message::attachment_content
            target.insert(
                constants::KEY_DATA_ID,
                PropertyValue::Int32(entry.index() as i32),
            );
            target.insert(
                constants::KEY_CONTENT_LENGTH,
                PropertyValue::Int64(entry.stream_size() as i64),
            );
            return;
        }

        let encoding = StreamEncoding::from_type_code(&type_code);
        if encoding == StreamEncoding::Binary && self.config.withholds(&field_name) {
            debug!("[msg] withholding binary payload of {}", field_name);
            return;
        }

        let value = encoding.decode(self.ole_file.read_entry_data(entry));
        let key = target.insert_unique(&field_name, value);
        debug!("[msg] {} -> {}", entry.name(), key);
    }
}

#[cfg(test)]
mod tests {
    use super::{split_stream_name, Message, StorageKind};
    use crate::config::ParserConfig;
    use crate::error::OleError;
    use crate::property::{FixedValue, PropertyBag, PropertyValue};
    use crate::test_support::{
        property_record, storage, stream, top_level_properties, utf16, ContainerBuilder,
    };
    use chrono::{TimeZone, Utc};

    fn attachment_payload() -> Vec<u8> {
        (0..5000).map(|i| (i % 253) as u8).collect()
    }

    fn sample_message() -> Vec<u8> {
        let mut recipient_properties = vec![0u8; 8];
        recipient_properties.extend(property_record(0x0003, 0x0C15, 2, 1i64.to_le_bytes()));

        ContainerBuilder::new(512)
            .stream("__substg1.0_0037001F", utf16("Quarterly numbers\0"))
            .stream("__substg1.0_0C1A001F", utf16("Alice Example"))
            .stream("__substg1.0_1000001F", utf16("See attached."))
            .stream("__substg1.0_10130102", b"<html></html>".to_vec())
            .stream("__substg1.0_007D001E", b"Received: by example\0".to_vec())
            .stream("__substg1.0_8001001F", utf16("custom"))
            .stream(
                "__properties_version1.0",
                top_level_properties(&[
                    property_record(
                        0x0040,
                        0x0E06,
                        0x0000_0006,
                        116_444_736_000_000_000u64.to_le_bytes(),
                    ),
                    property_record(0x0003, 0x0E07, 0x0000_0006, 19i64.to_le_bytes()),
                ]),
            )
            .storage(
                "__recip_version1.0_#00000000",
                vec![
                    stream("__substg1.0_3001001F", utf16("Bob Example")),
                    stream("__substg1.0_3003001F", utf16("bob@example.com")),
                    stream("__substg1.0_39FE001F", utf16("bob@example.com")),
                    stream("__properties_version1.0", recipient_properties),
                ],
            )
            .storage(
                "__attach_version1.0_#00000000",
                vec![
                    stream("__substg1.0_3707001F", utf16("report.pdf")),
                    stream("__substg1.0_370E001F", utf16("application/pdf")),
                    stream("__substg1.0_3712001F", utf16("part1")),
                    stream("__substg1.0_0037001F", utf16("attachment subject")),
                    stream("__substg1.0_37010102", attachment_payload()),
                ],
            )
            .storage(
                "__attach_version1.0_#00000001",
                vec![
                    stream("__substg1.0_3707001F", utf16("forwarded.msg")),
                    storage(
                        "__substg1.0_3701000D",
                        vec![stream("__substg1.0_0037001F", utf16("inner subject"))],
                    ),
                ],
            )
            .storage(
                "Custom",
                vec![stream("__substg1.0_0E1D001F", utf16("numbers"))],
            )
            .build()
    }

    fn attachment_named<'a>(message: &'a Message, name: &str) -> &'a PropertyBag {
        message
            .fields()
            .attachments()
            .iter()
            .find(|bag| bag.get_str("AttachLongFileName") == Some(name))
            .unwrap()
    }

    #[test]
    fn test_storage_kind() {
        assert_eq!(
            StorageKind::from_name("__attach_version1.0_#0000000A"),
            StorageKind::Attachment
        );
        assert_eq!(
            StorageKind::from_name("__recip_version1.0_#00000000"),
            StorageKind::Recipient
        );
        assert_eq!(
            StorageKind::from_name("__substg1.0_3701000d"),
            StorageKind::EmbeddedMessage
        );
        assert_eq!(
            StorageKind::from_name("__nameid_version1.0"),
            StorageKind::Other
        );
    }

    #[test]
    fn test_split_stream_name() {
        assert_eq!(
            split_stream_name("__substg1.0_0037001f"),
            Some(("0037".to_string(), "001F".to_string()))
        );
        assert_eq!(
            split_stream_name("__substg1.0_1039101F-00000001"),
            Some(("1039".to_string(), "101F".to_string()))
        );
        assert_eq!(split_stream_name("__substg1.0_xyz"), None);
        assert_eq!(split_stream_name("short"), None);
    }

    #[test]
    fn test_message_fields() {
        let message = Message::parse(sample_message()).unwrap();
        let fields = message.fields();
        assert_eq!(fields.subject(), Some("Quarterly numbers"));
        assert_eq!(fields.sender_name(), Some("Alice Example"));
        assert_eq!(fields.body(), Some("See attached."));
        assert_eq!(
            fields.fields.get("TransportMessageHeaders"),
            Some(&PropertyValue::String("Received: by example".to_string()))
        );
        assert_eq!(fields.fields.get_str("_8001"), Some("custom"));
        // flattened out of the Custom storage
        assert_eq!(fields.fields.get_str("NormalizedSubject"), Some("numbers"));
        // binary html is withheld by default
        assert!(!fields.fields.contains_key("BodyHtml"));
    }

    #[test]
    fn test_fixed_properties() {
        let message = Message::parse(sample_message()).unwrap();
        let properties = message.fields().properties().unwrap();
        let delivery = properties
            .get("MessageDeliveryTime")
            .and_then(PropertyValue::as_fixed)
            .unwrap();
        assert_eq!(
            delivery.value,
            Some(FixedValue::Time(Utc.timestamp_millis_opt(0).unwrap()))
        );
        let flags = properties
            .get("MessageFlags")
            .and_then(PropertyValue::as_fixed)
            .unwrap();
        assert_eq!(flags.value, Some(FixedValue::Int32(19)));

        let counters = message.property_header().unwrap();
        assert_eq!(counters.attachment_count, 2);
        assert_eq!(counters.recipient_count, 3);
    }

    #[test]
    fn test_recipients() {
        let message = Message::parse(sample_message()).unwrap();
        let recipients = message.fields().recipients();
        assert_eq!(recipients.len(), 1);
        let recipient = &recipients[0];
        assert_eq!(recipient.get_str("DisplayName"), Some("Bob Example"));
        assert_eq!(recipient.get_str("EmailAddress"), Some("bob@example.com"));
        assert_eq!(recipient.get_str("SmtpAddress"), Some("bob@example.com"));

        let recipient_type = recipient
            .get("_properties")
            .and_then(PropertyValue::as_bag)
            .and_then(|bag| bag.get("RecipientType"))
            .and_then(PropertyValue::as_fixed)
            .unwrap();
        assert_eq!(recipient_type.value, Some(FixedValue::Int32(1)));

        // the recipient's fields stay in its own bag
        assert!(!message.fields().fields.contains_key("DisplayName"));
    }

    #[test]
    fn test_attachments_are_isolated() {
        let message = Message::parse(sample_message()).unwrap();
        let fields = message.fields();
        assert_eq!(fields.attachments().len(), 2);

        let report = attachment_named(&message, "report.pdf");
        assert_eq!(report.get_str("AttachMimeTag"), Some("application/pdf"));
        assert_eq!(report.get_str("AttachmentContentId"), Some("part1"));
        assert_eq!(report.get_str("Subject"), Some("attachment subject"));
        assert!(!report.contains_key("AttachDataObject"));
        assert_eq!(
            report.get("contentLength").and_then(PropertyValue::as_i64),
            Some(5000)
        );

        // the attachment's Subject did not leak into the message bag
        assert_eq!(fields.subject(), Some("Quarterly numbers"));
        assert!(!fields.fields.contains_key("Subject-2"));
        assert!(!fields.fields.contains_key("AttachLongFileName"));
    }

    #[test]
    fn test_attachment_content_on_demand() {
        let message = Message::parse(sample_message()).unwrap();
        let report = attachment_named(&message, "report.pdf");
        assert_eq!(
            message.attachment_content(report).unwrap(),
            attachment_payload()
        );

        let forwarded = attachment_named(&message, "forwarded.msg");
        assert!(matches!(
            message.attachment_content(forwarded),
            Err(OleError::DirectoryEntryNotFound)
        ));
        assert!(message.attachment_content_by_id(10_000).is_err());
        assert!(matches!(
            message.attachment_content_by_id(0),
            Err(OleError::NotAStream(0))
        ));
    }

    #[test]
    fn test_embedded_message_is_flagged() {
        let message = Message::parse(sample_message()).unwrap();
        let forwarded = attachment_named(&message, "forwarded.msg");
        assert_eq!(
            forwarded.get("EmbeddedMessage"),
            Some(&PropertyValue::Bool(true))
        );
        assert!(!forwarded.contains_key("Subject"));
        assert!(message.fields().is_embedded_message_present());
    }

    #[test]
    fn test_duplicate_names_are_kept() {
        let data = ContainerBuilder::new(512)
            .stream("__substg1.0_0037001F", utf16("wide"))
            .stream("__substg1.0_0037001E", b"narrow".to_vec())
            .build();
        let message = Message::parse(data).unwrap();
        let fields = &message.fields().fields;
        let mut values = vec![
            fields.get_str("Subject").unwrap().to_string(),
            fields.get_str("Subject-2").unwrap().to_string(),
        ];
        values.sort();
        assert_eq!(values, vec!["narrow", "wide"]);
    }

    #[test]
    fn test_multi_valued_streams_keep_their_name() {
        let data = ContainerBuilder::new(512)
            .storage(
                "__attach_version1.0_#00000000",
                vec![
                    stream("__substg1.0_1039101F-00000000", utf16("<first@example.com>")),
                    stream("__substg1.0_1039101F-00000001", utf16("<second@example.com>")),
                ],
            )
            .build();
        let message = Message::parse(data).unwrap();
        let attachment = &message.fields().attachments()[0];
        let mut keys = attachment.keys().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["InternetReferences", "InternetReferences-2"]);

        let mut values = keys
            .iter()
            .map(|key| attachment.get_str(key).unwrap().to_string())
            .collect::<Vec<_>>();
        values.sort();
        assert_eq!(values, vec!["<first@example.com>", "<second@example.com>"]);
    }

    #[test]
    fn test_withheld_fields_are_configurable() {
        let config = ParserConfig::default().with_withheld_binary_fields(vec![]);
        let message = Message::parse_with_config(sample_message(), &config).unwrap();
        assert_eq!(
            message.fields().fields.get("BodyHtml"),
            Some(&PropertyValue::Binary(b"<html></html>".to_vec()))
        );
    }

    #[test]
    fn test_sub_object_properties_can_be_skipped() {
        let config = ParserConfig::default().with_sub_object_properties(false);
        let message = Message::parse_with_config(sample_message(), &config).unwrap();
        assert!(!message.fields().recipients()[0].contains_key("_properties"));
        assert!(message.fields().properties().is_some());
    }

    #[test]
    fn test_bad_property_header_is_fatal() {
        let mut properties = top_level_properties(&[]);
        properties[0] = 0xFF;
        let data = ContainerBuilder::new(512)
            .stream("__substg1.0_0037001F", utf16("subject"))
            .stream("__properties_version1.0", properties)
            .build();
        let error = Message::parse(data).unwrap_err();
        assert!(error.is_format_error());
    }

    #[test]
    fn test_large_sectors() {
        let data = ContainerBuilder::new(4096)
            .stream("__substg1.0_0037001F", utf16("big sectors"))
            .storage(
                "__attach_version1.0_#00000000",
                vec![stream("__substg1.0_37010102", attachment_payload())],
            )
            .build();
        let message = Message::parse(data).unwrap();
        assert_eq!(message.fields().subject(), Some("big sectors"));
        let attachment = &message.fields().attachments()[0];
        assert_eq!(
            message.attachment_content(attachment).unwrap(),
            attachment_payload()
        );
    }

    #[test]
    fn test_to_bag_serializes() {
        let message = Message::parse(sample_message()).unwrap();
        let bag = message.fields().to_bag();
        let json = serde_json::to_value(&bag).unwrap();
        assert_eq!(json["Subject"], "Quarterly numbers");
        assert_eq!(json["attachments"].as_array().unwrap().len(), 2);
        assert_eq!(json["recipients"][0]["DisplayName"], "Bob Example");
        assert_eq!(
            json["_properties"]["MessageFlags"]["value"],
            serde_json::json!(19)
        );
    }

    #[test]
    fn test_from_reader_blocking() {
        let data = sample_message();
        let message = tokio_test::block_on(Message::from_reader(
            &data[..],
            &ParserConfig::default(),
        ));
        let message = tokio_test::assert_ok!(message);
        assert_eq!(message.fields().recipients().len(), 1);
    }

    #[tokio::test]
    async fn test_from_path() {
        let path = std::env::temp_dir().join(format!("msg-rs-{}.msg", std::process::id()));
        tokio::fs::write(&path, sample_message()).await.unwrap();
        let message = Message::from_path(&path).await;
        let _ = tokio::fs::remove_file(&path).await;
        assert_eq!(message.unwrap().fields().subject(), Some("Quarterly numbers"));
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let result = Message::from_path("/definitely/not/here.msg").await;
        assert!(matches!(result, Err(OleError::StdIo(_))));
    }
}
