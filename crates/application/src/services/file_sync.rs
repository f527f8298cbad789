use data_encoding::BASE64;
use domain::{ConnectionId, Feedback, FileListing, RoomId, ServerEvent, UploadFilePayload};
use futures::future::join_all;
use serde_json::json;
use tracing::{debug, info, warn};

use super::SessionRouter;
use crate::collaborators::FileBlob;
use crate::error::{ApplicationError, ApplicationResult};

impl SessionRouter {
    /// 上传成功后先回执上传者，再向整个房间刷新文件列表。
    pub async fn upload_file(
        &self,
        connection_id: ConnectionId,
        payload: UploadFilePayload,
    ) -> ApplicationResult<()> {
        let UploadFilePayload { room_id, file } = payload;
        if !self.room_exists(&room_id).await {
            return Err(ApplicationError::room_not_found(&room_id));
        }

        let bytes = match BASE64.decode(file.data.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                let err = ApplicationError::InvalidPayload(format!("file data: {err}"));
                warn!(room_id = %room_id, error = %err, "rejecting upload");
                return self
                    .reply(connection_id, ServerEvent::CompleteFileUpload(Feedback::error(err)))
                    .await;
            }
        };

        let blob = FileBlob {
            name: file.name,
            bytes,
        };
        match self.gateway.upload_object(&room_id, blob, false).await {
            Ok(object) => {
                info!(room_id = %room_id, key = %object.key, size = object.size, "file uploaded");
                self.reply(
                    connection_id,
                    ServerEvent::CompleteFileUpload(Feedback::ok(
                        json!({"key": object.key, "size": object.size}),
                    )),
                )
                .await?;
                self.refresh_file_list(&room_id).await;
                Ok(())
            }
            Err(err) => {
                warn!(room_id = %room_id, error = %err, "file upload failed");
                self.reply(
                    connection_id,
                    ServerEvent::CompleteFileUpload(Feedback::error(err)),
                )
                .await
            }
        }
    }

    /// 向房间广播当前文件列表，随后对每个文件查元数据，标记为主文件的
    /// 额外广播一次 `update-main-file`。
    pub async fn refresh_file_list(&self, room_id: &RoomId) {
        let keys = match self.gateway.list_objects(room_id).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(room_id = %room_id, error = %err, "error retrieving files");
                return;
            }
        };

        if keys.is_empty() {
            debug!(room_id = %room_id, "no files found");
            self.broadcaster
                .broadcast_to_room(room_id, ServerEvent::UpdateFileList(FileListing::empty()))
                .await;
            return;
        }

        let files = keys
            .iter()
            .map(|key| (key.clone(), self.settings.object_url(room_id, key)))
            .collect();
        self.broadcaster
            .broadcast_to_room(room_id, ServerEvent::UpdateFileList(FileListing::files(files)))
            .await;

        let lookups = keys
            .iter()
            .map(|key| self.gateway.fetch_object_metadata(room_id, key));
        for (key, metadata) in keys.iter().zip(join_all(lookups).await) {
            match metadata {
                Ok(metadata) if metadata.is_main => {
                    let url = self.settings.object_url(room_id, &metadata.name);
                    self.broadcaster
                        .broadcast_to_room(room_id, ServerEvent::UpdateMainFile(Feedback::ok(url)))
                        .await;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(room_id = %room_id, key = %key, error = %err, "error retrieving file metadata");
                }
            }
        }
    }
}
