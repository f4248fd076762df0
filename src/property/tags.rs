//! Property tag to canonical name lookup.
//! https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxprops

use std::collections::HashMap;

use lazy_static::lazy_static;

const PROPERTY_TAGS: &[(&str, &str)] = &[
    ("0002", "AlternateRecipientAllowed"),
    ("0017", "Importance"),
    ("001A", "MessageClass"),
    ("0023", "OriginatorDeliveryReportRequested"),
    ("0026", "Priority"),
    ("0029", "ReadReceiptRequested"),
    ("002B", "RecipientReassignmentProhibited"),
    ("002E", "OriginalSensitivity"),
    ("0036", "Sensitivity"),
    ("0037", "Subject"),
    ("0039", "ClientSubmitTime"),
    ("003B", "SentRepresentingSearchKey"),
    ("003D", "SubjectPrefix"),
    ("003F", "ReceivedByEntryId"),
    ("0040", "ReceivedByName"),
    ("0041", "SentRepresentingEntryId"),
    ("0042", "SentRepresentingName"),
    ("0043", "ReceivedRepresentingEntryId"),
    ("0044", "ReceivedRepresentingName"),
    ("0047", "MessageSubmissionId"),
    ("004F", "ReplyRecipientEntries"),
    ("0050", "ReplyRecipientNames"),
    ("0051", "ReceivedBySearchKey"),
    ("0052", "ReceivedRepresentingSearchKey"),
    ("0057", "MessageToMe"),
    ("0058", "MessageCcMe"),
    ("0060", "StartDate"),
    ("0061", "EndDate"),
    ("0064", "SentRepresentingAddressType"),
    ("0065", "SentRepresentingEmailAddress"),
    ("0070", "ConversationTopic"),
    ("0071", "ConversationIndex"),
    ("0075", "ReceivedByAddressType"),
    ("0076", "ReceivedByEmailAddress"),
    ("0077", "ReceivedRepresentingAddressType"),
    ("0078", "ReceivedRepresentingEmailAddress"),
    ("007D", "TransportMessageHeaders"),
    ("0C15", "RecipientType"),
    ("0C17", "ReplyRequested"),
    ("0C19", "SenderEntryId"),
    ("0C1A", "SenderName"),
    ("0C1D", "SenderSearchKey"),
    ("0C1E", "SenderAddressType"),
    ("0C1F", "SenderEmailAddress"),
    ("0E01", "DeleteAfterSubmit"),
    ("0E02", "DisplayBcc"),
    ("0E03", "DisplayCc"),
    ("0E04", "DisplayTo"),
    ("0E06", "MessageDeliveryTime"),
    ("0E07", "MessageFlags"),
    ("0E08", "MessageSize"),
    ("0E0F", "Responsibility"),
    ("0E1B", "HasAttachments"),
    ("0E1D", "NormalizedSubject"),
    ("0E1F", "RtfInSync"),
    ("0E20", "AttachSize"),
    ("0E21", "AttachNumber"),
    ("0E28", "PrimarySendAccount"),
    ("0E29", "NextSendAcct"),
    ("0FF4", "Access"),
    ("0FF7", "AccessLevel"),
    ("0FF8", "MappingSignature"),
    ("0FF9", "RecordKey"),
    ("0FFA", "StoreRecordKey"),
    ("0FFB", "StoreEntryId"),
    ("0FFE", "ObjectType"),
    ("0FFF", "EntryId"),
    ("1000", "Body"),
    ("1009", "RtfCompressed"),
    ("1013", "BodyHtml"),
    ("1014", "BodyContentLocation"),
    ("1015", "BodyContentId"),
    ("1035", "InternetMessageId"),
    ("1039", "InternetReferences"),
    ("1042", "InReplyToId"),
    ("1080", "IconIndex"),
    ("1081", "LastVerbExecuted"),
    ("1082", "LastVerbExecutionTime"),
    ("1090", "FlagStatus"),
    ("1091", "FlagCompleteTime"),
    ("3001", "DisplayName"),
    ("3002", "AddressType"),
    ("3003", "EmailAddress"),
    ("3007", "CreationTime"),
    ("3008", "LastModificationTime"),
    ("300B", "SearchKey"),
    ("3701", "AttachDataObject"),
    ("3702", "AttachEncoding"),
    ("3703", "AttachExtension"),
    ("3704", "AttachFilename"),
    ("3705", "AttachMethod"),
    ("3707", "AttachLongFileName"),
    ("370B", "RenderingPosition"),
    ("370E", "AttachMimeTag"),
    ("3712", "AttachmentContentId"),
    ("3713", "AttachContentLocation"),
    ("3714", "AttachFlags"),
    ("39FE", "SmtpAddress"),
    ("3A00", "Account"),
    ("3A20", "TransmittableDisplayName"),
    ("3A40", "SendRichInfo"),
    ("3FDE", "InternetCodepage"),
    ("3FF1", "MessageLocaleId"),
    ("3FF8", "CreatorName"),
    ("3FFA", "LastModifierName"),
    ("3FFD", "MessageCodepage"),
    ("5FF6", "RecipientDisplayName"),
    ("5FF7", "RecipientEntryId"),
    ("5FFD", "RecipientFlags"),
    ("5FFF", "RecipientTrackStatus"),
    ("7FFE", "AttachmentHidden"),
    ("7FFF", "AttachmentContactPhoto"),
];

lazy_static! {
    static ref TAG_NAMES: HashMap<&'static str, &'static str> =
        PROPERTY_TAGS.iter().copied().collect();
}

/// Canonical name for a four hex digit tag, case-insensitive.
pub fn lookup(tag: &str) -> Option<&'static str> {
    TAG_NAMES.get(tag.to_ascii_uppercase().as_str()).copied()
}

pub fn lookup_id(tag: u16) -> Option<&'static str> {
    lookup(&format!("{:04X}", tag))
}
