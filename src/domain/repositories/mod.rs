// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 核心逻辑只依赖按域名或URL的创建、读取和更新操作，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 域名仓库（domain_repository）：管理线索域名及其状态
/// - 页面仓库（page_repository）：追加和读取页面记录
/// - 线索仓库（lead_repository）：画像快照、评分历史和变更事件
pub mod domain_repository;
pub mod lead_repository;
pub mod page_repository;
