// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 测试主模块
///
/// 端到端测试：用脚本化的抓取引擎驱动完整的域名处理流程
mod e2e;
