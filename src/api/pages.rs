use super::{Client, Device, Endpoint, FetchError, RawMessage};
use crate::pager::{Page, PageCursor, PageSource};

/// All devices of a group.
pub struct DevicePages<'a> {
    pub client: &'a Client,
    pub group_id: &'a str,
    pub token: &'a str,
}

impl PageSource<Device> for DevicePages<'_> {
    async fn fetch_page(&self, cursor: Option<PageCursor>) -> Result<Page<Device>, FetchError> {
        let endpoint = Endpoint::Devices {
            group_id: self.group_id,
        };
        self.client.fetch_page(&endpoint, self.token, cursor).await
    }
}

/// All messages of a single device.
pub struct MessagePages<'a> {
    pub client: &'a Client,
    pub group_id: &'a str,
    pub device_id: &'a str,
    pub token: &'a str,
}

impl PageSource<RawMessage> for MessagePages<'_> {
    async fn fetch_page(
        &self,
        cursor: Option<PageCursor>,
    ) -> Result<Page<RawMessage>, FetchError> {
        let endpoint = Endpoint::Messages {
            group_id: self.group_id,
            device_id: self.device_id,
        };
        self.client.fetch_page(&endpoint, self.token, cursor).await
    }
}
