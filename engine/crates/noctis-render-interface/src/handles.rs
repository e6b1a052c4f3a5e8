use slotmap::new_key_type;

new_key_type! {
    /// GPU 资源句柄（纹理或缓冲区）
    ///
    /// 由 `GfxResourceManager` 分配，在资源销毁前一直有效。
    pub struct GfxResourceHandle;
}
